//! # Ports Layer
//!
//! Inbound API and outbound dependencies of the prepare flow.

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
