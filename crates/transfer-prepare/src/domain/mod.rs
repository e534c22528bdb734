//! # Domain Layer
//!
//! Prepare lifecycle, header enrichment rule and error types.

pub mod errors;
pub mod value_objects;

pub use errors::*;
pub use value_objects::*;
