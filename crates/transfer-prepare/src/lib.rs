//! # Transfer Prepare
//!
//! Publishes transfer prepare events to the messaging backbone.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! For each inbound prepare request:
//! - resolve the payee's routable address through the participant directory
//! - wrap the request in the standard envelope, enriching its headers
//! - derive the topic and partition key from `(transfer, prepare)`
//! - hand the envelope to the backbone and report acceptance
//!
//! ## Failure Semantics
//!
//! | Step | Error | Published? |
//! |------|-------|------------|
//! | Address resolution | `ResolutionError` | No |
//! | Envelope build | `BuildError` | No |
//! | Topic config | `TopicConfigError` | No |
//! | Publish | `PublishError` | Not accepted |
//! | Deadline | `DeadlineExceeded` | Never reported as success |
//!
//! Calls are not idempotent: every call publishes a new envelope with a fresh
//! event id, and consumers deduplicate.
//!
//! ## Module Structure
//!
//! ```text
//! transfer-prepare/
//! ├── domain/          # PrepareState, DestinationRule, errors
//! ├── algorithms/      # EnvelopeBuilder
//! ├── ports/           # TransferPrepareApi, AddressResolver, TimeSource
//! ├── adapters/        # HttpAddressResolver
//! ├── retry.rs         # PublishRetryPolicy
//! └── service.rs       # PrepareService
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod algorithms;
pub mod domain;
pub mod ports;
pub mod retry;
pub mod service;

// Re-exports
pub use adapters::{DirectoryClientConfig, HttpAddressResolver};
pub use algorithms::EnvelopeBuilder;
pub use domain::{
    AddressHeaderMatch, BuildError, DestinationRule, PrepareError, PrepareState, ResolutionError,
};
pub use ports::{
    AddressResolver, FixedTimeSource, IdGenerator, MockAddressResolver, SequentialIdGenerator,
    SystemTimeSource, TimeSource, TransferPrepareApi, UuidV4Generator,
};
pub use retry::PublishRetryPolicy;
pub use service::{PrepareService, TRANSFER_FUNCTIONALITY};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
