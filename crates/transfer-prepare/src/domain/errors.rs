//! # Domain Errors
//!
//! Error types for the transfer prepare flow. Every failure aborts the flow
//! and is surfaced to the caller; nothing is partially published.

use super::value_objects::PrepareState;
use shared_bus::{PublishError, TopicConfigError};
use std::time::Duration;
use thiserror::Error;

/// Failure to turn a participant id into a routable address.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    /// The participant id was empty. No lookup was attempted.
    #[error("Participant id is empty")]
    EmptyParticipantId,

    /// The directory does not know the participant.
    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    /// The directory answered with a non-success status.
    #[error("Directory returned {status}: {body}")]
    Directory {
        /// HTTP status code
        status: u16,
        /// Response body, as returned
        body: String,
    },

    /// Transport-level failure reaching the directory.
    #[error("Network error: {0}")]
    Network(String),

    /// The directory did not answer in time.
    #[error("Directory lookup timed out after {0:?}")]
    Timeout(Duration),

    /// The directory answered but the address could not be read.
    #[error("Malformed directory response: {0}")]
    MalformedResponse(String),

    /// The resolver itself is misconfigured.
    #[error("Invalid directory configuration: {0}")]
    InvalidConfiguration(String),
}

impl ResolutionError {
    /// True when the directory positively reported the participant as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UnknownParticipant(_))
    }
}

/// Failure to assemble the message envelope.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    /// A field the envelope is addressed by was empty.
    #[error("Required field is empty: {0}")]
    EmptyField(&'static str),

    /// The request could not be encoded as the envelope payload.
    #[error("Payload encoding failed: {0}")]
    Payload(String),
}

/// Any failure of a prepare call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PrepareError {
    /// Address resolution failed. Nothing was published.
    #[error("Address resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    /// Envelope assembly failed. Nothing was published.
    #[error("Envelope build failed: {0}")]
    Build(#[from] BuildError),

    /// Topic or producer config could not be resolved. Nothing was published.
    #[error("Topic configuration error: {0}")]
    Configuration(#[from] TopicConfigError),

    /// The backbone did not accept the envelope.
    #[error("Publish failed: {0}")]
    Publish(#[from] PublishError),

    /// The call ran past its deadline and was abandoned.
    #[error("Prepare deadline of {deadline:?} exceeded in state {reached}")]
    DeadlineExceeded {
        /// Configured deadline.
        deadline: Duration,
        /// Last state the call reached.
        reached: PrepareState,
    },
}

impl PrepareError {
    /// Short label for logs and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resolution(_) => "resolution",
            Self::Build(_) => "build",
            Self::Configuration(_) => "configuration",
            Self::Publish(_) => "publish",
            Self::DeadlineExceeded { .. } => "deadline",
        }
    }
}
