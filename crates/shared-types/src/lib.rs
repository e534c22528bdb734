//! # Shared Types Crate
//!
//! This crate contains the transfer entities and the `MessageEnvelope`
//! handed to the messaging backbone.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: The envelope wire shape is defined here only.
//! - **Forward, Never Store**: Requests are immutable values that are wrapped
//!   and forwarded.
//! - **Ordered Extensions**: Extension keys are not unique; order is kept.

pub mod entities;
pub mod envelope;

pub use entities::*;
pub use envelope::*;
