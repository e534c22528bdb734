//! # Algorithms
//!
//! Pure transformations of the prepare flow.

pub mod envelope_builder;

pub use envelope_builder::EnvelopeBuilder;
