//! # Transfer Entities
//!
//! The inbound transfer prepare request as it arrives from a participant.
//!
//! ## Clusters
//!
//! - **Request**: `TransferPrepareRequest`, `Money`, `ExtensionList`
//! - **Protocol**: `Headers` and case-insensitive header lookup

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Protocol headers carried with a request (name → value).
///
/// A `BTreeMap` keeps the serialized header object stable across runs.
pub type Headers = BTreeMap<String, String>;

/// Identifier of a participant (FSP) in the scheme.
pub type ParticipantId = String;

/// Well-known FSPIOP header names.
pub mod headers {
    /// Identifier of the sending participant.
    pub const FSPIOP_SOURCE: &str = "fspiop-source";
    /// Identifier of the final recipient participant.
    pub const FSPIOP_DESTINATION: &str = "fspiop-destination";
    /// Address of the immediate hop when a request is forwarded.
    pub const FSPIOP_ADDRESS: &str = "fspiop-address";
    /// Content type of the request body.
    pub const CONTENT_TYPE: &str = "content-type";
    /// Request date.
    pub const DATE: &str = "date";
}

/// Look up a header by name, ignoring ASCII case.
#[must_use]
pub fn header_value<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// A monetary amount.
///
/// The amount is kept as its decimal string so it is forwarded without
/// floating point rounding. Both `"123.45"` and `123.45` are accepted on input;
/// a numeric amount keeps its input digits (`100.10` stays `"100.10"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// ISO 4217 currency code.
    pub currency: String,
    /// Decimal amount.
    #[serde(deserialize_with = "decimal_string")]
    pub amount: String,
}

impl Money {
    /// Create a new amount.
    pub fn new(currency: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            amount: amount.into(),
        }
    }
}

fn decimal_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Decimal {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Decimal::deserialize(deserializer)? {
        Decimal::Text(text) => text,
        Decimal::Number(number) => number.to_string(),
    })
}

/// A single extension key/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    /// Extension key.
    pub key: String,
    /// Extension value.
    pub value: String,
}

/// Ordered list of extensions.
///
/// Keys are NOT unique: the same key may appear several times and every
/// occurrence is forwarded in its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionList {
    /// The extensions in arrival order.
    pub extension: Vec<Extension>,
}

impl ExtensionList {
    /// Append an extension, keeping any existing entry with the same key.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.extension.push(Extension {
            key: key.into(),
            value: value.into(),
        });
    }

    /// All values recorded for `key`, in order.
    pub fn values_for<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.extension
            .iter()
            .filter(move |ext| ext.key == key)
            .map(|ext| ext.value.as_str())
    }

    /// Number of extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.extension.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extension.is_empty()
    }
}

/// An inbound transfer prepare request.
///
/// Created per inbound call and never mutated afterwards; it is transformed
/// into a message envelope and forwarded, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferPrepareRequest {
    /// Opaque unique transfer identifier.
    pub transfer_id: String,
    /// Receiving participant.
    pub payee_fsp: ParticipantId,
    /// Sending participant.
    pub payer_fsp: ParticipantId,
    /// Amount to transfer.
    pub amount: Money,
    /// Transport-layer packet carrying the condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ilp_packet: Option<String>,
    /// Condition (commitment) the fulfilment must satisfy.
    pub condition: String,
    /// Expiration timestamp as sent by the payer.
    pub expiration: String,
    /// Optional extensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_list: Option<ExtensionList>,
    /// Fields this service does not interpret, forwarded verbatim.
    #[serde(flatten)]
    pub additional: serde_json::Map<String, serde_json::Value>,
}
