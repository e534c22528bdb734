//! # Shared Bus - Messaging Backbone Access
//!
//! Everything a service needs to hand an envelope to the backbone.
//!
//! ## Components
//!
//! - **Topics:** deterministic `(functionality, action)` → topic name and
//!   producer config (`TopicResolver`)
//! - **Publisher:** the `MessageProducer` port (connect / produce / disconnect)
//! - **Adapters:** `InMemoryMessageBus` (single process, tests) and
//!   `KafkaMessageProducer` (feature `kafka`)
//!
//! ```text
//! ┌──────────────┐  produce(envelope, topic, config)  ┌──────────────┐
//! │   Service    │ ─────────────────────────────────→ │   Backbone   │
//! └──────────────┘ ←──────────── accepted ─────────── └──────────────┘
//!                                                            │ subscribe()
//!                                                            ↓
//!                                                      downstream consumers
//! ```
//!
//! ## Ordering
//!
//! The topic descriptor's `key` is the partition key. Messages sharing a key
//! are delivered in order; nothing is promised across keys.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod publisher;
pub mod subscriber;
pub mod topics;

// Re-export main types
#[cfg(feature = "kafka")]
pub use kafka::KafkaMessageProducer;
pub use publisher::{
    encode_envelope, InMemoryMessageBus, MessageProducer, PublishError, PublishedRecord,
};
pub use subscriber::{RecordFilter, RecordStream, RecordSubscriber, Subscription, SubscriptionError};
pub use topics::{
    ClientOptions, Flow, ProducerConfig, TopicConfigError, TopicDescriptor, TopicResolver,
    TopicTemplates,
};

/// Maximum records to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Largest encoded message the in-memory backbone accepts (1 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Accepted records the in-memory backbone keeps for inspection.
pub const DEFAULT_RETAINED_RECORDS: usize = 1000;
