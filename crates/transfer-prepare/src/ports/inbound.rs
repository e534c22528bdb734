//! # Inbound Ports
//!
//! The API the prepare flow exposes to its callers.

use crate::domain::PrepareError;
use async_trait::async_trait;
use shared_types::{Headers, TransferPrepareRequest};

/// Transfer prepare API - inbound port.
#[async_trait]
pub trait TransferPrepareApi: Send + Sync {
    /// Resolve the payee address, build the prepare envelope and publish it.
    ///
    /// Returns `true` once the backbone has accepted the envelope. Every call
    /// publishes a new envelope with a fresh event id; retries by the caller
    /// produce duplicates that downstream consumers deduplicate.
    async fn prepare(
        &self,
        headers: &Headers,
        request: &TransferPrepareRequest,
    ) -> Result<bool, PrepareError>;
}
