//! Switch configuration with validation.
//!
//! Sources, later wins: built-in defaults, the JSON file named by
//! `SW_CONFIG_FILE`, then individual `SW_*` environment overrides.

use serde::{Deserialize, Serialize};
use shared_bus::topics::{CLIENT_ID_PROPERTY, MESSAGE_TIMEOUT_PROPERTY};
use shared_bus::{Flow, ProducerConfig, TopicConfigError, TopicResolver, TopicTemplates};
use shared_types::headers;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use transfer_prepare::adapters::directory_client::PARTICIPANT_ID_PLACEHOLDER;
use transfer_prepare::{
    AddressHeaderMatch, DestinationRule, DirectoryClientConfig, PublishRetryPolicy,
    TRANSFER_FUNCTIONALITY,
};

/// Environment variable naming the JSON config file.
pub const CONFIG_FILE_ENV: &str = "SW_CONFIG_FILE";

/// Main switch configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchConfig {
    /// HTTP ingress
    pub http: HttpConfig,
    /// Participant directory client
    pub directory: DirectoryConfig,
    /// Messaging backbone
    pub kafka: KafkaConfig,
    /// Topic name templates
    pub topics: TopicTemplates,
    /// Header enrichment
    pub headers: HeaderConfig,
    /// Publish retries
    pub retry: RetryConfig,
    /// Deadline for a whole prepare call, in milliseconds
    pub prepare_timeout_ms: Option<u64>,
}

impl SwitchConfig {
    /// Load from `SW_CONFIG_FILE` (if set) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file. Missing sections take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&raw)
    }

    /// Parse a JSON config document.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `SW_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("SW_HTTP_PORT") {
            self.http.port = parse_env("SW_HTTP_PORT", &port)?;
        }
        if let Some(url) = lookup("SW_DIRECTORY_URL") {
            self.directory.base_url = url;
        }
        if let Some(brokers) = lookup("SW_KAFKA_BROKERS") {
            self.kafka.brokers = brokers;
        }
        if let Some(ms) = lookup("SW_PREPARE_TIMEOUT_MS") {
            self.prepare_timeout_ms = Some(parse_env("SW_PREPARE_TIMEOUT_MS", &ms)?);
        }
        if let Some(retries) = lookup("SW_PUBLISH_RETRIES") {
            self.retry.max_times = parse_env("SW_PUBLISH_RETRIES", &retries)?;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if self.directory.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidUrl("directory base_url is empty".into()));
        }
        if !self
            .directory
            .participant_path
            .contains(PARTICIPANT_ID_PLACEHOLDER)
        {
            return Err(ConfigError::InvalidUrl(format!(
                "participant_path '{}' lacks {{participantId}}",
                self.directory.participant_path
            )));
        }

        // Validate timeouts
        if self.directory.timeout_ms == 0 || self.directory.connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(
                "directory timeouts cannot be 0".into(),
            ));
        }
        if self.kafka.message_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(
                "kafka message_timeout_ms cannot be 0".into(),
            ));
        }
        if self.prepare_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidTimeout(
                "prepare_timeout_ms cannot be 0".into(),
            ));
        }

        if self.headers.destination_header.trim().is_empty() {
            return Err(ConfigError::Invalid("destination_header is empty".into()));
        }
        if self.kafka.max_message_bytes == 0 {
            return Err(ConfigError::Invalid("max_message_bytes cannot be 0".into()));
        }

        self.topics
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }

    /// Directory client settings.
    pub fn directory_client(&self) -> DirectoryClientConfig {
        DirectoryClientConfig {
            base_url: self.directory.base_url.clone(),
            participant_path: self.directory.participant_path.clone(),
            timeout: Duration::from_millis(self.directory.timeout_ms),
            connect_timeout: Duration::from_millis(self.directory.connect_timeout_ms),
        }
    }

    /// Header enrichment rule.
    ///
    /// A configured suffix takes precedence over the name list.
    pub fn destination_rule(&self) -> DestinationRule {
        let matcher = match &self.headers.address_header_suffix {
            Some(suffix) if !suffix.is_empty() => AddressHeaderMatch::Suffix(suffix.clone()),
            _ => AddressHeaderMatch::Named(self.headers.address_headers.clone()),
        };
        DestinationRule::new(matcher, self.headers.destination_header.clone())
    }

    /// Publish retry policy.
    pub fn retry_policy(&self) -> PublishRetryPolicy {
        if self.retry.max_times == 0 {
            return PublishRetryPolicy::None;
        }
        PublishRetryPolicy::Exponential {
            min_delay: Duration::from_millis(self.retry.min_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            max_times: self.retry.max_times,
        }
    }

    /// Deadline for a prepare call.
    pub fn prepare_deadline(&self) -> Option<Duration> {
        self.prepare_timeout_ms.map(Duration::from_millis)
    }

    /// Topic resolver with the transfer prepare producer registered.
    pub fn topic_resolver(&self) -> Result<TopicResolver, TopicConfigError> {
        let action = shared_types::EventAction::Prepare.as_str();
        let mut producer =
            ProducerConfig::standard(&self.kafka.brokers, TRANSFER_FUNCTIONALITY, action)
                .with_property(
                    MESSAGE_TIMEOUT_PROPERTY,
                    self.kafka.message_timeout_ms.to_string(),
                );
        if let Some(client_id) = &self.kafka.client_id {
            producer = producer.with_property(CLIENT_ID_PROPERTY, client_id);
        }

        Ok(TopicResolver::new(self.topics.clone())?.with_config(
            Flow::Producer,
            TRANSFER_FUNCTIONALITY,
            action,
            producer,
        ))
    }

    /// True when a real backbone is configured.
    pub fn uses_kafka(&self) -> bool {
        !self.kafka.brokers.trim().is_empty()
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: value.to_string(),
    })
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
        }
    }
}

/// Participant directory configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Directory root URL
    pub base_url: String,
    /// Lookup path containing `{participantId}`
    pub participant_path: String,
    /// Request timeout
    pub timeout_ms: u64,
    /// Connect timeout
    pub connect_timeout_ms: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        let client = DirectoryClientConfig::default();
        Self {
            base_url: client.base_url,
            participant_path: client.participant_path,
            timeout_ms: 5_000,
            connect_timeout_ms: 2_000,
        }
    }
}

/// Messaging backbone configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Comma separated broker list. Empty selects the in-memory backbone.
    pub brokers: String,
    /// Overrides the standard `client.id`
    pub client_id: Option<String>,
    /// Delivery timeout
    pub message_timeout_ms: u64,
    /// Largest accepted message (in-memory backbone)
    pub max_message_bytes: usize,
    /// Accepted records kept for inspection (in-memory backbone, 0 = none)
    pub retained_records: usize,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: String::new(),
            client_id: None,
            message_timeout_ms: 10_000,
            max_message_bytes: shared_bus::DEFAULT_MAX_MESSAGE_BYTES,
            retained_records: shared_bus::DEFAULT_RETAINED_RECORDS,
        }
    }
}

/// Header enrichment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    /// Header names that trigger enrichment
    pub address_headers: Vec<String>,
    /// Alternatively, any header ending with this suffix
    pub address_header_suffix: Option<String>,
    /// Header that receives the resolved address
    pub destination_header: String,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            address_headers: vec![headers::FSPIOP_ADDRESS.to_string()],
            address_header_suffix: None,
            destination_header: headers::FSPIOP_DESTINATION.to_string(),
        }
    }
}

/// Publish retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt; 0 disables retrying
    pub max_times: usize,
    /// First backoff delay
    pub min_delay_ms: u64,
    /// Backoff ceiling
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_times: 0,
            min_delay_ms: 100,
            max_delay_ms: 5_000,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// HTTP port of zero
    #[error("http port cannot be 0")]
    InvalidPort,
    /// Bad directory URL or path
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// Unparseable environment override
    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
    },
    /// Config file could not be read
    #[error("cannot read {path}: {message}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        message: String,
    },
    /// Config file is not valid JSON for this schema
    #[error("cannot parse config: {0}")]
    Parse(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = SwitchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.http_addr().port(), 3000);
        assert!(!config.uses_kafka());
        assert_eq!(config.retry_policy(), PublishRetryPolicy::None);
        assert_eq!(config.prepare_deadline(), None);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SwitchConfig::default();
        config
            .apply_env(env(&[
                ("SW_HTTP_PORT", "8080"),
                ("SW_DIRECTORY_URL", "http://central-directory:3001"),
                ("SW_KAFKA_BROKERS", "kafka:9092"),
                ("SW_PREPARE_TIMEOUT_MS", "2500"),
                ("SW_PUBLISH_RETRIES", "3"),
            ]))
            .unwrap();

        assert_eq!(config.http.port, 8080);
        assert_eq!(config.directory.base_url, "http://central-directory:3001");
        assert!(config.uses_kafka());
        assert_eq!(config.prepare_deadline(), Some(Duration::from_millis(2500)));
        assert_eq!(config.retry_policy().max_attempts(), 4);
    }

    #[test]
    fn test_bad_env_value_rejected() {
        let mut config = SwitchConfig::default();
        let err = config.apply_env(env(&[("SW_HTTP_PORT", "eighty")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                var: "SW_HTTP_PORT",
                value: "eighty".into()
            }
        );
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config =
            SwitchConfig::from_json(r#"{ "directory": { "base_url": "http://dir:9000" } }"#)
                .unwrap();
        assert_eq!(config.directory.base_url, "http://dir:9000");
        assert_eq!(config.directory.timeout_ms, 5_000);
        assert_eq!(config.http.port, 3000);
        assert_eq!(config.kafka.retained_records, shared_bus::DEFAULT_RETAINED_RECORDS);
    }

    #[test]
    fn test_retention_from_json() {
        let config = SwitchConfig::from_json(r#"{ "kafka": { "retained_records": 0 } }"#).unwrap();
        assert_eq!(config.kafka.retained_records, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let mut config = SwitchConfig::default();
        config.http.port = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidPort));

        let mut config = SwitchConfig::default();
        config.directory.participant_path = "/participants".into();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));

        let mut config = SwitchConfig::default();
        config.directory.timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout(_))));

        let mut config = SwitchConfig::default();
        config.headers.destination_header = String::new();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_destination_rule_prefers_suffix() {
        let mut config = SwitchConfig::default();
        assert_eq!(config.destination_rule(), DestinationRule::default());

        config.headers.address_header_suffix = Some("-address".into());
        assert_eq!(
            config.destination_rule().matcher,
            AddressHeaderMatch::Suffix("-address".into())
        );
    }

    #[test]
    fn test_topic_resolver_registers_prepare_producer() {
        let mut config = SwitchConfig::default();
        config.kafka.brokers = "kafka:9092".into();
        config.kafka.client_id = Some("switch-1".into());

        let resolver = config.topic_resolver().unwrap();
        let producer = resolver
            .producer_config_for(Flow::Producer, "TRANSFER", "PREPARE")
            .unwrap();

        assert_eq!(producer.client_id(), Some("switch-1"));
        assert_eq!(producer.message_timeout(), Duration::from_secs(10));
        assert_eq!(
            resolver.topic_for("transfer", "prepare", None, None).topic_name,
            "topic-transfer-prepare"
        );
    }
}
