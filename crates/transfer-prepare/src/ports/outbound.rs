//! # Outbound Ports
//!
//! Traits for external dependencies (participant directory, clock, ids).

use crate::domain::ResolutionError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Participant directory - outbound port.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Resolve a participant id to its routable address.
    ///
    /// The returned address is never empty. Nothing is cached.
    async fn resolve(&self, participant_id: &str) -> Result<String, ResolutionError>;
}

/// Time source abstraction for testability.
pub trait TimeSource: Send + Sync {
    /// Current wall clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// System time implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Source of event ids.
pub trait IdGenerator: Send + Sync {
    /// A fresh, never repeated id.
    fn next_id(&self) -> Uuid;
}

/// Random (v4) UUIDs.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidV4Generator;

impl IdGenerator for UuidV4Generator {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Fixed time for testing.
#[derive(Clone, Copy, Debug)]
pub struct FixedTimeSource(pub DateTime<Utc>);

impl TimeSource for FixedTimeSource {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Deterministic ids 1, 2, 3, ... for testing.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> Uuid {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        Uuid::from_u128(u128::from(n))
    }
}

/// In-memory directory for testing.
#[derive(Debug, Default)]
pub struct MockAddressResolver {
    addresses: HashMap<String, String>,
    failure: Mutex<Option<ResolutionError>>,
    calls: AtomicU64,
}

impl MockAddressResolver {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an address.
    pub fn with_address(mut self, participant_id: &str, address: &str) -> Self {
        self.addresses
            .insert(participant_id.to_string(), address.to_string());
        self
    }

    /// Fail every lookup with `error`.
    pub fn failing(self, error: ResolutionError) -> Self {
        *self.failure.lock() = Some(error);
        self
    }

    /// Number of lookups made.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl AddressResolver for MockAddressResolver {
    async fn resolve(&self, participant_id: &str) -> Result<String, ResolutionError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        if participant_id.is_empty() {
            return Err(ResolutionError::EmptyParticipantId);
        }
        self.addresses
            .get(participant_id)
            .cloned()
            .ok_or_else(|| ResolutionError::UnknownParticipant(participant_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_resolver() {
        let resolver = MockAddressResolver::new().with_address("1234", "dfsp2");

        assert_eq!(resolver.resolve("1234").await.unwrap(), "dfsp2");
        assert_eq!(
            resolver.resolve("9999").await,
            Err(ResolutionError::UnknownParticipant("9999".into()))
        );
        assert_eq!(resolver.calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_resolver_failure_mode() {
        let resolver = MockAddressResolver::new()
            .with_address("1234", "dfsp2")
            .failing(ResolutionError::Network("refused".into()));

        assert!(matches!(
            resolver.resolve("1234").await,
            Err(ResolutionError::Network(_))
        ));
    }

    #[test]
    fn test_sequential_ids_are_distinct() {
        let ids = SequentialIdGenerator::default();
        let first = ids.next_id();
        let second = ids.next_id();
        assert_ne!(first, second);
        assert_eq!(first, Uuid::from_u128(1));
    }

    #[test]
    fn test_v4_ids_are_distinct() {
        let ids = UuidV4Generator;
        assert_ne!(ids.next_id(), ids.next_id());
    }
}
