//! # Prepare Service
//!
//! Sequences one prepare call:
//!
//! ```text
//! resolve(payeeFsp) → build envelope → topic + config → publish → true
//! ```
//!
//! The first failing step ends the call. Nothing is published unless every
//! earlier step succeeded.

use crate::algorithms::EnvelopeBuilder;
use crate::domain::{PrepareError, PrepareState};
use crate::ports::{AddressResolver, TransferPrepareApi};
use crate::retry::PublishRetryPolicy;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_bus::{Flow, MessageProducer, TopicResolver};
use shared_types::{EventAction, EventType, Headers, TransferPrepareRequest};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Entity name used for topic and config lookups.
pub const TRANSFER_FUNCTIONALITY: &str = "transfer";

/// Transfer prepare orchestrator.
pub struct PrepareService {
    resolver: Arc<dyn AddressResolver>,
    producer: Arc<dyn MessageProducer>,
    topics: Arc<TopicResolver>,
    builder: EnvelopeBuilder,
    retry: PublishRetryPolicy,
    deadline: Option<Duration>,
    published: AtomicU64,
    failed: AtomicU64,
}

impl std::fmt::Debug for PrepareService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrepareService")
            .field("retry", &self.retry)
            .field("deadline", &self.deadline)
            .field("published", &self.prepares_published())
            .field("failed", &self.prepares_failed())
            .finish_non_exhaustive()
    }
}

impl PrepareService {
    /// Create a service with default envelope building, a single publish
    /// attempt and no deadline.
    pub fn new(
        resolver: Arc<dyn AddressResolver>,
        producer: Arc<dyn MessageProducer>,
        topics: Arc<TopicResolver>,
    ) -> Self {
        Self {
            resolver,
            producer,
            topics,
            builder: EnvelopeBuilder::default(),
            retry: PublishRetryPolicy::None,
            deadline: None,
            published: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Replace the envelope builder.
    pub fn with_envelope_builder(mut self, builder: EnvelopeBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Replace the publish retry policy.
    pub fn with_retry_policy(mut self, retry: PublishRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Bound every prepare call by `deadline`.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Prepares accepted by the backbone.
    pub fn prepares_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Prepares that failed at any step.
    pub fn prepares_failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Producer handle, for shutdown.
    pub fn producer(&self) -> &Arc<dyn MessageProducer> {
        &self.producer
    }

    /// `state` is shared with the caller so an abandoned call can report
    /// how far it got.
    async fn run(
        &self,
        headers: &Headers,
        request: &TransferPrepareRequest,
        state: &Mutex<PrepareState>,
    ) -> Result<(), PrepareError> {
        let transfer_id = request.transfer_id.as_str();

        let address = self
            .resolver
            .resolve(&request.payee_fsp)
            .await
            .inspect_err(|e| fail(transfer_id, *state.lock(), e.to_string()))?;
        advance(transfer_id, state, PrepareState::AddressResolved);

        let envelope = self
            .builder
            .build(request, headers, &address)
            .inspect_err(|e| fail(transfer_id, *state.lock(), e.to_string()))?;
        advance(transfer_id, state, PrepareState::EnvelopeBuilt);

        let action = EventAction::Prepare.as_str();
        let topic = self
            .topics
            .topic_for(TRANSFER_FUNCTIONALITY, action, None, Some(transfer_id));
        let config = self
            .topics
            .producer_config_for(Flow::Producer, TRANSFER_FUNCTIONALITY, action)
            .inspect_err(|e| fail(transfer_id, *state.lock(), e.to_string()))?;

        self.retry
            .publish(self.producer.as_ref(), &envelope, &topic, &config)
            .await
            .inspect_err(|e| fail(transfer_id, *state.lock(), e.to_string()))?;
        advance(transfer_id, state, PrepareState::Published);

        info!(
            transfer_id,
            event_id = %envelope.event_id(),
            event_type = ?EventType::Prepare,
            topic = %topic.topic_name,
            to = %envelope.to,
            "Transfer prepare published"
        );
        Ok(())
    }
}

fn advance(transfer_id: &str, state: &Mutex<PrepareState>, to: PrepareState) {
    let mut current = state.lock();
    debug_assert!(current.can_transition_to(to));
    debug!(transfer_id, from = %*current, to = %to, "Prepare state transition");
    *current = to;
}

fn fail(transfer_id: &str, from: PrepareState, error: String) {
    warn!(
        transfer_id,
        from = %from,
        to = %PrepareState::Failed,
        error = %error,
        "Transfer prepare failed"
    );
}

#[async_trait]
impl TransferPrepareApi for PrepareService {
    async fn prepare(
        &self,
        headers: &Headers,
        request: &TransferPrepareRequest,
    ) -> Result<bool, PrepareError> {
        let state = Mutex::new(PrepareState::Received);
        let result = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.run(headers, request, &state))
                .await
                .unwrap_or_else(|_| {
                    let reached = *state.lock();
                    fail(
                        &request.transfer_id,
                        reached,
                        format!("deadline of {deadline:?} exceeded"),
                    );
                    Err(PrepareError::DeadlineExceeded { deadline, reached })
                }),
            None => self.run(headers, request, &state).await,
        };

        match result {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                Ok(true)
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }
}
