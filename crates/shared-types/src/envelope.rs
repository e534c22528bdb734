//! # Message Envelope
//!
//! The unit handed to the messaging backbone. Its JSON form is the
//! compatibility contract with every downstream consumer:
//!
//! ```text
//! {
//!   "id": "...", "to": "...", "from": "...", "type": "...",
//!   "content":  { "headers": { ... }, "payload": { ... } },
//!   "metadata": { "event": { "id", "type", "action", "createdAt", "status" } }
//! }
//! ```

use crate::entities::Headers;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content type of a transfer business object.
pub const TRANSFER_CONTENT_TYPE: &str =
    "application/vnd.interoperability.transfers+json;version=1.0";

/// Business event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Transfer prepare.
    Prepare,
}

/// Business action carried by the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    /// Transfer prepare.
    Prepare,
}

impl EventAction {
    /// Wire name of the action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
        }
    }
}

/// Outcome recorded on the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// The event represents a successful step.
    Success,
    /// The event represents a failed step.
    Failure,
}

/// Event metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    /// Fresh identifier of this event. Downstream deduplication keys on it.
    pub id: Uuid,
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Event action.
    pub action: EventAction,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Event status.
    pub status: EventStatus,
}

/// Envelope metadata section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// The business event.
    pub event: EventMetadata,
}

/// Envelope content section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageContent<T> {
    /// Protocol headers, possibly enriched.
    pub headers: Headers,
    /// Original request payload.
    pub payload: T,
}

/// The standard message envelope.
///
/// Generic over the payload; the backbone handles the JSON form
/// (`MessageEnvelope<serde_json::Value>`, the default).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope<T = serde_json::Value> {
    /// Business identifier (the transfer id).
    pub id: String,
    /// Recipient participant.
    pub to: String,
    /// Sending participant.
    pub from: String,
    /// Versioned content type of the payload.
    #[serde(rename = "type")]
    pub content_type: String,
    /// Headers and payload.
    pub content: MessageContent<T>,
    /// Event metadata.
    pub metadata: MessageMetadata,
}

impl<T> MessageEnvelope<T> {
    /// Identifier of the event carried by this envelope.
    #[must_use]
    pub fn event_id(&self) -> Uuid {
        self.metadata.event.id
    }

    /// Protocol headers of the envelope.
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.content.headers
    }
}

impl MessageEnvelope<serde_json::Value> {
    /// Decode the JSON payload into a typed value.
    pub fn decode_payload<P: DeserializeOwned>(&self) -> Result<P, serde_json::Error> {
        P::deserialize(&self.content.payload)
    }
}
