//! # Envelope Builder
//!
//! Turns a prepare request, its headers and the resolved payee address into
//! the message envelope. Deterministic given the injected clock and id
//! generator.

use crate::domain::{BuildError, DestinationRule};
use crate::ports::{IdGenerator, SystemTimeSource, TimeSource, UuidV4Generator};
use shared_types::{
    EventAction, EventMetadata, EventStatus, EventType, Headers, MessageContent, MessageEnvelope,
    MessageMetadata, TransferPrepareRequest, TRANSFER_CONTENT_TYPE,
};
use std::sync::Arc;

/// Builds prepare envelopes.
#[derive(Clone)]
pub struct EnvelopeBuilder {
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn TimeSource>,
    rule: DestinationRule,
}

impl Default for EnvelopeBuilder {
    fn default() -> Self {
        Self::new(
            Arc::new(UuidV4Generator),
            Arc::new(SystemTimeSource),
            DestinationRule::default(),
        )
    }
}

impl std::fmt::Debug for EnvelopeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeBuilder")
            .field("rule", &self.rule)
            .finish_non_exhaustive()
    }
}

impl EnvelopeBuilder {
    /// Create a builder from its collaborators.
    pub fn new(
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn TimeSource>,
        rule: DestinationRule,
    ) -> Self {
        Self { ids, clock, rule }
    }

    /// Replace the header enrichment rule.
    pub fn with_rule(mut self, rule: DestinationRule) -> Self {
        self.rule = rule;
        self
    }

    /// Header enrichment rule in use.
    pub fn rule(&self) -> &DestinationRule {
        &self.rule
    }

    /// Build the prepare envelope.
    ///
    /// `id`, `to` and `from` come from the transfer id, payee and payer.
    /// Headers are copied and enriched with the destination header when an
    /// address header is present. The request itself is the payload.
    pub fn build(
        &self,
        request: &TransferPrepareRequest,
        headers: &Headers,
        resolved_address: &str,
    ) -> Result<MessageEnvelope, BuildError> {
        require("transferId", &request.transfer_id)?;
        require("payeeFsp", &request.payee_fsp)?;
        require("payerFsp", &request.payer_fsp)?;
        require("resolvedAddress", resolved_address)?;

        let payload =
            serde_json::to_value(request).map_err(|e| BuildError::Payload(e.to_string()))?;

        Ok(MessageEnvelope {
            id: request.transfer_id.clone(),
            to: request.payee_fsp.clone(),
            from: request.payer_fsp.clone(),
            content_type: TRANSFER_CONTENT_TYPE.to_string(),
            content: MessageContent {
                headers: self.rule.enrich(headers, resolved_address),
                payload,
            },
            metadata: MessageMetadata {
                event: EventMetadata {
                    id: self.ids.next_id(),
                    event_type: EventType::Prepare,
                    action: EventAction::Prepare,
                    created_at: self.clock.now(),
                    status: EventStatus::Success,
                },
            },
        })
    }
}

fn require(field: &'static str, value: &str) -> Result<(), BuildError> {
    if value.trim().is_empty() {
        return Err(BuildError::EmptyField(field));
    }
    Ok(())
}
