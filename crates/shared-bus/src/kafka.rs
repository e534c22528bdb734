//! # Kafka Producer
//!
//! `MessageProducer` backed by `rdkafka`. One producer is kept per topic and
//! built from the `rdkafkaConf`/`topicConf` maps of the resolved config.

use crate::publisher::{encode_envelope, MessageProducer, PublishError};
use crate::topics::{ProducerConfig, TopicDescriptor};
use async_trait::async_trait;
use parking_lot::Mutex;
use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use shared_types::MessageEnvelope;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How long `disconnect` waits for in-flight deliveries.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Kafka-backed message producer.
#[derive(Default)]
pub struct KafkaMessageProducer {
    producers: Mutex<HashMap<String, FutureProducer>>,
    messages_published: AtomicU64,
}

impl std::fmt::Debug for KafkaMessageProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaMessageProducer")
            .field("topics", &self.producers.lock().len())
            .finish_non_exhaustive()
    }
}

impl KafkaMessageProducer {
    /// Create a producer with no open connections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn client_config(config: &ProducerConfig) -> ClientConfig {
        let mut client = ClientConfig::new();
        for (key, value) in config.rdkafka_conf.iter().chain(config.topic_conf.iter()) {
            client.set(key, value);
        }
        client
    }

    fn producer_for(
        &self,
        topic: &TopicDescriptor,
        config: &ProducerConfig,
    ) -> Result<FutureProducer, PublishError> {
        let mut producers = self.producers.lock();
        if let Some(producer) = producers.get(&topic.topic_name) {
            return Ok(producer.clone());
        }

        let producer: FutureProducer = Self::client_config(config).create().map_err(|e| {
            error!(topic = %topic.topic_name, error = %e, "Failed to create producer");
            PublishError::Unavailable(e.to_string())
        })?;

        info!(
            topic = %topic.topic_name,
            client_id = config.client_id().unwrap_or_default(),
            "Producer connected"
        );
        producers.insert(topic.topic_name.clone(), producer.clone());
        Ok(producer)
    }
}

fn map_delivery_error(err: KafkaError, timeout: Duration) -> PublishError {
    match err.rdkafka_error_code() {
        Some(RDKafkaErrorCode::MessageTimedOut) => PublishError::Timeout(timeout),
        Some(RDKafkaErrorCode::MessageSizeTooLarge)
        | Some(RDKafkaErrorCode::InvalidMessage)
        | Some(RDKafkaErrorCode::TopicAuthorizationFailed) => {
            PublishError::Rejected(err.to_string())
        }
        _ => PublishError::Unavailable(err.to_string()),
    }
}

#[async_trait]
impl MessageProducer for KafkaMessageProducer {
    async fn connect(
        &self,
        topic: &TopicDescriptor,
        config: &ProducerConfig,
    ) -> Result<(), PublishError> {
        self.producer_for(topic, config).map(|_| ())
    }

    async fn produce(
        &self,
        envelope: &MessageEnvelope,
        topic: &TopicDescriptor,
        config: &ProducerConfig,
    ) -> Result<bool, PublishError> {
        let producer = self.producer_for(topic, config)?;
        let payload = encode_envelope(envelope)?;
        let timeout = config.message_timeout();

        let mut record: FutureRecord<'_, str, Vec<u8>> =
            FutureRecord::to(&topic.topic_name).payload(&payload);
        if let Some(key) = topic.key.as_deref() {
            record = record.key(key);
        }
        if let Some(partition) = topic.partition {
            record = record.partition(partition);
        }

        match producer.send(record, timeout).await {
            Ok((partition, offset)) => {
                self.messages_published.fetch_add(1, Ordering::Relaxed);
                debug!(
                    topic = %topic.topic_name,
                    key = topic.key.as_deref().unwrap_or_default(),
                    partition,
                    offset,
                    payload_size = payload.len(),
                    "Message produced"
                );
                Ok(true)
            }
            Err((err, _)) => {
                error!(
                    topic = %topic.topic_name,
                    key = topic.key.as_deref().unwrap_or_default(),
                    error = %err,
                    "Failed to produce message"
                );
                Err(map_delivery_error(err, timeout))
            }
        }
    }

    async fn disconnect(&self, topic_name: Option<&str>) -> Result<(), PublishError> {
        let drained: Vec<(String, FutureProducer)> = {
            let mut producers = self.producers.lock();
            match topic_name {
                Some(topic) => producers
                    .remove(topic)
                    .map(|p| vec![(topic.to_string(), p)])
                    .ok_or_else(|| PublishError::NotConnected(topic.to_string()))?,
                None => producers.drain().collect(),
            }
        };

        // flush blocks the calling thread until deliveries settle
        tokio::task::spawn_blocking(move || {
            for (topic, producer) in drained {
                match producer.flush(FLUSH_TIMEOUT) {
                    Ok(()) => debug!(topic = %topic, "Producer flushed and closed"),
                    Err(e) => warn!(topic = %topic, error = %e, "Producer flush failed"),
                }
            }
        })
        .await
        .map_err(|e| PublishError::Unavailable(e.to_string()))
    }

    fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}
