//! # Adapters
//!
//! Concrete implementations of outbound ports.

pub mod directory_client;

pub use directory_client::{DirectoryClientConfig, HttpAddressResolver};
