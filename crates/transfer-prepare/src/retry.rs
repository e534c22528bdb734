//! # Publish Retry Policy
//!
//! Explicit, injectable retry of transient publish failures. The default is a
//! single attempt.

use backon::{ExponentialBuilder, Retryable};
use shared_bus::{MessageProducer, ProducerConfig, PublishError, TopicDescriptor};
use shared_types::MessageEnvelope;
use std::time::Duration;
use tracing::warn;

/// How publish failures are retried.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PublishRetryPolicy {
    /// One attempt only.
    #[default]
    None,
    /// Exponential backoff between attempts.
    Exponential {
        /// Delay before the first retry.
        min_delay: Duration,
        /// Upper bound on any single delay.
        max_delay: Duration,
        /// Retries after the first attempt.
        max_times: usize,
    },
}

impl PublishRetryPolicy {
    /// Exponential backoff from 100ms up to 5s.
    pub fn exponential(max_times: usize) -> Self {
        if max_times == 0 {
            return Self::None;
        }
        Self::Exponential {
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            max_times,
        }
    }

    /// Upper bound on produce attempts.
    pub fn max_attempts(&self) -> usize {
        match self {
            Self::None => 1,
            Self::Exponential { max_times, .. } => max_times + 1,
        }
    }

    /// Produce the envelope, retrying transient failures per the policy.
    ///
    /// A produce call that returns `false` is reported as
    /// [`PublishError::NotAcknowledged`] and not retried.
    pub async fn publish(
        &self,
        producer: &dyn MessageProducer,
        envelope: &MessageEnvelope,
        topic: &TopicDescriptor,
        config: &ProducerConfig,
    ) -> Result<(), PublishError> {
        let attempt = move || async move {
            match producer.produce(envelope, topic, config).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(PublishError::NotAcknowledged(topic.topic_name.clone())),
                Err(e) => Err(e),
            }
        };

        match *self {
            Self::None => attempt().await,
            Self::Exponential {
                min_delay,
                max_delay,
                max_times,
            } => {
                attempt
                    .retry(
                        ExponentialBuilder::default()
                            .with_min_delay(min_delay)
                            .with_max_delay(max_delay)
                            .with_max_times(max_times),
                    )
                    .when(PublishError::is_transient)
                    .notify(|err: &PublishError, dur: Duration| {
                        warn!(
                            transfer_id = %envelope.id,
                            topic = %topic.topic_name,
                            error = %err,
                            "Retrying publish after {:?}",
                            dur
                        );
                    })
                    .await
            }
        }
    }
}
