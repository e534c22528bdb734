//! # Message Publisher
//!
//! Defines the publishing side of the messaging backbone.
//!
//! The contract is connect / produce / disconnect. `produce` resolves once
//! the backbone has accepted the message; it never waits for consumers.

use crate::subscriber::{RecordFilter, RecordStream, RecordSubscriber, Subscription};
use crate::topics::{ProducerConfig, TopicDescriptor};
use crate::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_MESSAGE_BYTES, DEFAULT_RETAINED_RECORDS};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::MessageEnvelope;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Error type for publish operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    /// No connection to the backbone for the topic.
    #[error("Backbone not connected for topic {0}")]
    NotConnected(String),

    /// The envelope could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The encoded message exceeds the backbone limit.
    #[error("Message too large: {size} bytes exceeds limit of {max}")]
    MessageTooLarge {
        /// Encoded size.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// The backbone refused the message.
    #[error("Message rejected by backbone: {0}")]
    Rejected(String),

    /// No acknowledgement within the delivery timeout.
    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),

    /// The backbone could not be reached.
    #[error("Backbone unavailable: {0}")]
    Unavailable(String),

    /// The backbone answered without accepting the message.
    #[error("Message not acknowledged on topic {0}")]
    NotAcknowledged(String),
}

impl PublishError {
    /// Whether another attempt may succeed.
    ///
    /// Rejections and encoding failures are permanent for a given message.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NotConnected(_) | Self::Timeout(_) | Self::Unavailable(_)
        )
    }
}

/// Encode an envelope into its wire form.
pub fn encode_envelope(envelope: &MessageEnvelope) -> Result<Vec<u8>, PublishError> {
    serde_json::to_vec(envelope).map_err(|e| PublishError::Serialization(e.to_string()))
}

/// Trait for producing envelopes to the messaging backbone.
///
/// Implementations are shared by every in-flight request and must be safe
/// for concurrent use.
#[async_trait]
pub trait MessageProducer: Send + Sync {
    /// Open (or reuse) a connection for the topic.
    async fn connect(
        &self,
        topic: &TopicDescriptor,
        config: &ProducerConfig,
    ) -> Result<(), PublishError>;

    /// Produce one envelope.
    ///
    /// # Returns
    ///
    /// `true` once the backbone has accepted the message.
    async fn produce(
        &self,
        envelope: &MessageEnvelope,
        topic: &TopicDescriptor,
        config: &ProducerConfig,
    ) -> Result<bool, PublishError>;

    /// Close the connection for one topic, or all topics when `None`.
    async fn disconnect(&self, topic_name: Option<&str>) -> Result<(), PublishError>;

    /// Total messages accepted by the backbone.
    fn messages_published(&self) -> u64;
}

/// A message accepted by the in-memory backbone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRecord {
    /// Topic the message was produced to.
    pub topic: String,
    /// Partition key.
    pub key: Option<String>,
    /// Explicit partition.
    pub partition: Option<i32>,
    /// Producing client.
    pub client_id: Option<String>,
    /// Encoded envelope.
    pub payload: Vec<u8>,
}

impl PublishedRecord {
    /// Decode the envelope carried by this record.
    pub fn envelope(&self) -> Result<MessageEnvelope, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }

    /// Decode the raw JSON carried by this record.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// In-memory implementation of the messaging backbone.
///
/// Accepted records are broadcast to subscribers. The most recent records
/// are also retained in order, up to the retention limit; older records are
/// evicted first. Suitable for single-process operation and tests; distributed deployments
/// use the Kafka producer.
pub struct InMemoryMessageBus {
    /// Broadcast sender for accepted records.
    sender: broadcast::Sender<PublishedRecord>,

    /// Topics with an open connection.
    connected: RwLock<HashSet<String>>,

    /// Most recent accepted records, in acceptance order.
    log: RwLock<VecDeque<PublishedRecord>>,

    /// Upper bound on `log`.
    retained_records: usize,

    /// Total records accepted.
    messages_published: AtomicU64,

    /// Largest encoded message accepted.
    max_message_bytes: usize,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryMessageBus {
    /// Create a new in-memory bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            connected: RwLock::new(HashSet::new()),
            log: RwLock::new(VecDeque::new()),
            retained_records: DEFAULT_RETAINED_RECORDS,
            messages_published: AtomicU64::new(0),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            capacity,
        }
    }

    /// Limit the encoded size of accepted messages.
    #[must_use]
    pub fn with_max_message_bytes(mut self, max_message_bytes: usize) -> Self {
        self.max_message_bytes = max_message_bytes;
        self
    }

    /// Keep at most `retained_records` accepted records. Zero disables
    /// retention; subscribers still receive every record.
    #[must_use]
    pub fn with_retention(mut self, retained_records: usize) -> Self {
        self.retained_records = retained_records;
        self
    }

    /// Get a stream of records matching a filter.
    #[must_use]
    pub fn record_stream(&self, filter: RecordFilter) -> RecordStream {
        self.subscribe(filter).into_stream()
    }

    /// Snapshot of the retained records, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<PublishedRecord> {
        self.log.read().iter().cloned().collect()
    }

    /// Accepted records for one topic.
    #[must_use]
    pub fn records_for_topic(&self, topic: &str) -> Vec<PublishedRecord> {
        self.log
            .read()
            .iter()
            .filter(|record| record.topic == topic)
            .cloned()
            .collect()
    }

    /// Whether a connection is open for the topic.
    #[must_use]
    pub fn is_connected(&self, topic: &str) -> bool {
        self.connected.read().contains(topic)
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the retention limit.
    #[must_use]
    pub fn retained_records(&self) -> usize {
        self.retained_records
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordSubscriber for InMemoryMessageBus {
    fn subscribe(&self, filter: RecordFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        debug!(filter = %filter.label(), "New subscription created");
        Subscription::new(receiver, filter)
    }
}

#[async_trait]
impl MessageProducer for InMemoryMessageBus {
    async fn connect(
        &self,
        topic: &TopicDescriptor,
        config: &ProducerConfig,
    ) -> Result<(), PublishError> {
        if self.connected.write().insert(topic.topic_name.clone()) {
            debug!(
                topic = %topic.topic_name,
                client_id = config.client_id().unwrap_or_default(),
                "Producer connected"
            );
        }
        Ok(())
    }

    async fn produce(
        &self,
        envelope: &MessageEnvelope,
        topic: &TopicDescriptor,
        config: &ProducerConfig,
    ) -> Result<bool, PublishError> {
        self.connect(topic, config).await?;

        let payload = encode_envelope(envelope)?;
        if payload.len() > self.max_message_bytes {
            warn!(
                topic = %topic.topic_name,
                size = payload.len(),
                max = self.max_message_bytes,
                "Message rejected (too large)"
            );
            return Err(PublishError::MessageTooLarge {
                size: payload.len(),
                max: self.max_message_bytes,
            });
        }

        let record = PublishedRecord {
            topic: topic.topic_name.clone(),
            key: topic.key.clone(),
            partition: topic.partition,
            client_id: config.client_id().map(str::to_string),
            payload,
        };

        if self.retained_records > 0 {
            let mut log = self.log.write();
            if log.len() == self.retained_records {
                log.pop_front();
            }
            log.push_back(record.clone());
        }
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        // Accepted even with no live subscriber.
        let receivers = self.sender.send(record).unwrap_or(0);
        debug!(
            topic = %topic.topic_name,
            key = topic.key.as_deref().unwrap_or_default(),
            receivers,
            "Message produced"
        );
        Ok(true)
    }

    async fn disconnect(&self, topic_name: Option<&str>) -> Result<(), PublishError> {
        let mut connected = self.connected.write();
        match topic_name {
            Some(topic) => {
                if !connected.remove(topic) {
                    return Err(PublishError::NotConnected(topic.to_string()));
                }
                debug!(topic = %topic, "Producer disconnected");
            }
            None => {
                debug!(topics = connected.len(), "All producers disconnected");
                connected.clear();
            }
        }
        Ok(())
    }

    fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}
