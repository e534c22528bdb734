//! # Domain Value Objects
//!
//! Prepare lifecycle state and the header enrichment rule.

use serde::{Deserialize, Serialize};
use shared_types::{headers, Headers};
use std::fmt;

/// Lifecycle of a single prepare call.
///
/// ```text
/// Received → AddressResolved → EnvelopeBuilt → Published
///     └──────────┴─────────────────┴──→ Failed
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrepareState {
    /// Request accepted for processing.
    #[default]
    Received,
    /// Payee address resolved.
    AddressResolved,
    /// Envelope assembled.
    EnvelopeBuilt,
    /// Backbone accepted the envelope.
    Published,
    /// A step failed; the call is over.
    Failed,
}

impl PrepareState {
    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: PrepareState) -> bool {
        match (self, next) {
            (Self::Received, Self::AddressResolved) => true,
            (Self::AddressResolved, Self::EnvelopeBuilt) => true,
            (Self::EnvelopeBuilt, Self::Published) => true,
            (from, Self::Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Published | Self::Failed)
    }
}

impl fmt::Display for PrepareState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::AddressResolved => "address_resolved",
            Self::EnvelopeBuilt => "envelope_built",
            Self::Published => "published",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Which inbound headers count as an address header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressHeaderMatch {
    /// Any of the listed names, ignoring case.
    Named(Vec<String>),
    /// Any name ending with the suffix, ignoring case.
    Suffix(String),
}

impl Default for AddressHeaderMatch {
    fn default() -> Self {
        Self::Named(vec![headers::FSPIOP_ADDRESS.to_string()])
    }
}

impl AddressHeaderMatch {
    /// Check a header name against the rule.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Named(names) => names.iter().any(|n| n.eq_ignore_ascii_case(name)),
            Self::Suffix(suffix) => {
                let name = name.to_ascii_lowercase();
                !suffix.is_empty() && name.ends_with(&suffix.to_ascii_lowercase())
            }
        }
    }
}

/// Adds the destination header when an address header is present.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationRule {
    /// Trigger for enrichment.
    pub matcher: AddressHeaderMatch,
    /// Header that receives the resolved address.
    pub destination_header: String,
}

impl Default for DestinationRule {
    fn default() -> Self {
        Self {
            matcher: AddressHeaderMatch::default(),
            destination_header: headers::FSPIOP_DESTINATION.to_string(),
        }
    }
}

impl DestinationRule {
    /// Create a rule.
    pub fn new(matcher: AddressHeaderMatch, destination_header: impl Into<String>) -> Self {
        Self {
            matcher,
            destination_header: destination_header.into(),
        }
    }

    /// True if any inbound header triggers enrichment.
    ///
    /// The destination header never triggers itself.
    pub fn has_address_header(&self, headers: &Headers) -> bool {
        headers.keys().any(|name| {
            !name.eq_ignore_ascii_case(&self.destination_header) && self.matcher.matches(name)
        })
    }

    /// Copy `headers` and, when an address header is present, set the
    /// destination header to `resolved_address`.
    ///
    /// An existing destination header is overwritten, whatever its case.
    /// Address headers are left untouched.
    pub fn enrich(&self, headers: &Headers, resolved_address: &str) -> Headers {
        let mut enriched = headers.clone();
        if self.has_address_header(headers) {
            enriched.retain(|name, _| !name.eq_ignore_ascii_case(&self.destination_header));
            enriched.insert(
                self.destination_header.clone(),
                resolved_address.to_string(),
            );
        }
        enriched
    }
}
