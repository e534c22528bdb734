//! # HTTP Participant Directory Client
//!
//! `AddressResolver` backed by the participant directory's HTTP API:
//!
//! ```text
//! GET {base_url}/participants/{participantId}  →  200 {"address": "dfsp2"}
//! ```
//!
//! The participant id is percent-encoded into its own path segment.

use crate::domain::ResolutionError;
use crate::ports::AddressResolver;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Placeholder substituted with the participant id.
pub const PARTICIPANT_ID_PLACEHOLDER: &str = "{participantId}";

/// Default lookup path.
pub const DEFAULT_PARTICIPANT_PATH: &str = "/participants/{participantId}";

/// Directory client configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryClientConfig {
    /// Directory root, e.g. `http://central-directory:3001`.
    pub base_url: String,
    /// Lookup path containing [`PARTICIPANT_ID_PLACEHOLDER`].
    pub participant_path: String,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
}

impl Default for DirectoryClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".to_string(),
            participant_path: DEFAULT_PARTICIPANT_PATH.to_string(),
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        }
    }
}

impl DirectoryClientConfig {
    /// Defaults with the given directory root.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct ParticipantAddress {
    #[serde(default)]
    address: Option<String>,
}

/// HTTP participant directory client.
#[derive(Clone, Debug)]
pub struct HttpAddressResolver {
    client: Client,
    base: Url,
    config: DirectoryClientConfig,
}

impl HttpAddressResolver {
    /// Build a client for the configured directory.
    pub fn new(config: DirectoryClientConfig) -> Result<Self, ResolutionError> {
        if !config.participant_path.contains(PARTICIPANT_ID_PLACEHOLDER) {
            return Err(ResolutionError::InvalidConfiguration(format!(
                "participant path '{}' lacks {PARTICIPANT_ID_PLACEHOLDER}",
                config.participant_path
            )));
        }

        let base = Url::parse(&config.base_url)
            .map_err(|e| ResolutionError::InvalidConfiguration(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ResolutionError::InvalidConfiguration(format!(
                "'{}' cannot be a base URL",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ResolutionError::InvalidConfiguration(e.to_string()))?;

        Ok(Self {
            client,
            base,
            config,
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &DirectoryClientConfig {
        &self.config
    }

    /// Lookup URL for a participant.
    pub fn participant_url(&self, participant_id: &str) -> Result<Url, ResolutionError> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                ResolutionError::InvalidConfiguration(self.config.base_url.clone())
            })?;
            segments.pop_if_empty();
            for segment in self.config.participant_path.split('/') {
                if segment.is_empty() {
                    continue;
                }
                segments.push(&segment.replace(PARTICIPANT_ID_PLACEHOLDER, participant_id));
            }
        }
        Ok(url)
    }

    fn transport_error(&self, err: reqwest::Error) -> ResolutionError {
        if err.is_timeout() {
            ResolutionError::Timeout(self.config.timeout)
        } else {
            ResolutionError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl AddressResolver for HttpAddressResolver {
    async fn resolve(&self, participant_id: &str) -> Result<String, ResolutionError> {
        if participant_id.trim().is_empty() {
            return Err(ResolutionError::EmptyParticipantId);
        }

        let url = self.participant_url(participant_id)?;
        debug!(participant_id, url = %url, "Resolving participant address");

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(participant_id, error = %e, "Directory request failed");
            self.transport_error(e)
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            warn!(participant_id, "Participant not found in directory");
            return Err(ResolutionError::UnknownParticipant(
                participant_id.to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(participant_id, status = status.as_u16(), "Directory lookup rejected");
            return Err(ResolutionError::Directory {
                status: status.as_u16(),
                body,
            });
        }

        let body: ParticipantAddress = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ResolutionError::Timeout(self.config.timeout)
            } else {
                ResolutionError::MalformedResponse(e.to_string())
            }
        })?;

        match body.address {
            Some(address) if !address.trim().is_empty() => {
                debug!(participant_id, address = %address, "Participant address resolved");
                Ok(address)
            }
            _ => Err(ResolutionError::MalformedResponse(
                "missing or empty address".to_string(),
            )),
        }
    }
}
