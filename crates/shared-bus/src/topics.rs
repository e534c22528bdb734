//! # Topic & Producer Configuration
//!
//! Deterministic mapping from a business `(functionality, action)` pair to a
//! topic descriptor and a producer configuration.
//!
//! Consumers predict topic names without asking the producer, so the mapping
//! has no randomness and depends only on values supplied once at start-up.
//!
//! ```text
//! ("transfer", "prepare")          -> topic-transfer-prepare
//! ("dfsp1", "transfer", "prepare") -> topic-dfsp1-transfer-prepare
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Template for topics shared by every participant.
pub const GENERAL_TOPIC_TEMPLATE: &str = "topic-{functionality}-{action}";

/// Template for participant-scoped topics.
pub const PARTICIPANT_TOPIC_TEMPLATE: &str = "topic-{participantName}-{functionality}-{action}";

/// Backbone property naming the broker list.
pub const BROKER_LIST_PROPERTY: &str = "metadata.broker.list";

/// Backbone property naming the client.
pub const CLIENT_ID_PROPERTY: &str = "client.id";

/// Backbone property bounding delivery time.
pub const MESSAGE_TIMEOUT_PROPERTY: &str = "message.timeout.ms";

/// Delivery timeout used when the config does not set one.
pub const DEFAULT_MESSAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Role of a backbone client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Flow {
    /// Publishes messages.
    Producer,
    /// Consumes messages.
    Consumer,
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Producer => write!(f, "PRODUCER"),
            Self::Consumer => write!(f, "CONSUMER"),
        }
    }
}

/// Errors from topic and config resolution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopicConfigError {
    /// No client configuration registered for the triple.
    #[error("No {flow} config registered for {functionality}/{action}")]
    MissingConfig {
        /// Client role.
        flow: Flow,
        /// Business entity, upper case.
        functionality: String,
        /// Business action, upper case.
        action: String,
    },

    /// A topic template lacks a required placeholder.
    #[error("Invalid topic template '{template}': missing {placeholder}")]
    InvalidTemplate {
        /// The rejected template.
        template: String,
        /// The missing placeholder.
        placeholder: &'static str,
    },
}

/// Where a message goes on the backbone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicDescriptor {
    /// Topic name.
    pub topic_name: String,
    /// Partition/ordering key. All messages with the same key land on the
    /// same partition in order.
    pub key: Option<String>,
    /// Explicit partition, if any.
    pub partition: Option<i32>,
}

/// Client-side options that are not backbone properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientOptions {
    /// Charset used to encode message values.
    pub message_charset: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            message_charset: "utf8".to_string(),
        }
    }
}

/// Producer configuration for one `(functionality, action)`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerConfig {
    /// Client options.
    pub options: ClientOptions,
    /// Backbone client properties.
    pub rdkafka_conf: BTreeMap<String, String>,
    /// Topic-level properties.
    pub topic_conf: BTreeMap<String, String>,
}

impl ProducerConfig {
    /// Standard producer config for a business action.
    ///
    /// `client.id` follows `ml-prod-{functionality}-{action}` and acks are
    /// required from all in-sync replicas.
    #[must_use]
    pub fn standard(brokers: &str, functionality: &str, action: &str) -> Self {
        let mut rdkafka_conf = BTreeMap::new();
        rdkafka_conf.insert(BROKER_LIST_PROPERTY.to_string(), brokers.to_string());
        rdkafka_conf.insert(
            CLIENT_ID_PROPERTY.to_string(),
            format!(
                "ml-prod-{}-{}",
                functionality.to_lowercase(),
                action.to_lowercase()
            ),
        );
        rdkafka_conf.insert("socket.keepalive.enable".to_string(), "true".to_string());
        rdkafka_conf.insert(
            "queue.buffering.max.messages".to_string(),
            "10000000".to_string(),
        );

        let mut topic_conf = BTreeMap::new();
        topic_conf.insert("request.required.acks".to_string(), "all".to_string());

        Self {
            options: ClientOptions::default(),
            rdkafka_conf,
            topic_conf,
        }
    }

    /// Set a backbone client property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.rdkafka_conf.insert(key.into(), value.into());
        self
    }

    /// The configured client id.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.rdkafka_conf.get(CLIENT_ID_PROPERTY).map(String::as_str)
    }

    /// Delivery timeout from `message.timeout.ms`, or the default.
    #[must_use]
    pub fn message_timeout(&self) -> Duration {
        self.rdkafka_conf
            .get(MESSAGE_TIMEOUT_PROPERTY)
            .and_then(|ms| ms.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_MESSAGE_TIMEOUT)
    }
}

/// Topic name templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicTemplates {
    /// Template for general topics.
    pub general: String,
    /// Template for participant topics.
    pub participant: String,
}

impl Default for TopicTemplates {
    fn default() -> Self {
        Self {
            general: GENERAL_TOPIC_TEMPLATE.to_string(),
            participant: PARTICIPANT_TOPIC_TEMPLATE.to_string(),
        }
    }
}

impl TopicTemplates {
    /// Check that each template carries the placeholders it needs.
    pub fn validate(&self) -> Result<(), TopicConfigError> {
        let required: [(&String, &[&'static str]); 2] = [
            (&self.general, &["{functionality}", "{action}"]),
            (
                &self.participant,
                &["{participantName}", "{functionality}", "{action}"],
            ),
        ];

        for (template, placeholders) in required {
            for &placeholder in placeholders.iter() {
                if !template.contains(placeholder) {
                    return Err(TopicConfigError::InvalidTemplate {
                        template: template.clone(),
                        placeholder,
                    });
                }
            }
        }
        Ok(())
    }
}

fn render(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |acc, (placeholder, value)| {
            acc.replace(placeholder, &value.to_lowercase())
        })
}

type ConfigKey = (Flow, String, String);

fn config_key(flow: Flow, functionality: &str, action: &str) -> ConfigKey {
    (flow, functionality.to_uppercase(), action.to_uppercase())
}

/// Resolves topic descriptors and client configs.
///
/// Built once at start-up and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct TopicResolver {
    templates: TopicTemplates,
    configs: HashMap<ConfigKey, ProducerConfig>,
}

impl TopicResolver {
    /// Create a resolver with the given templates and no client configs.
    pub fn new(templates: TopicTemplates) -> Result<Self, TopicConfigError> {
        templates.validate()?;
        Ok(Self {
            templates,
            configs: HashMap::new(),
        })
    }

    /// Default templates plus the transfer prepare producer config.
    #[must_use]
    pub fn with_defaults(brokers: &str) -> Self {
        Self::default().with_config(
            Flow::Producer,
            "transfer",
            "prepare",
            ProducerConfig::standard(brokers, "transfer", "prepare"),
        )
    }

    /// Register a client config. Names are case-insensitive.
    #[must_use]
    pub fn with_config(
        mut self,
        flow: Flow,
        functionality: &str,
        action: &str,
        config: ProducerConfig,
    ) -> Self {
        self.configs
            .insert(config_key(flow, functionality, action), config);
        self
    }

    /// Templates in use.
    #[must_use]
    pub fn templates(&self) -> &TopicTemplates {
        &self.templates
    }

    /// Topic name shared by every participant.
    #[must_use]
    pub fn general_topic_name(&self, functionality: &str, action: &str) -> String {
        render(
            &self.templates.general,
            &[("{functionality}", functionality), ("{action}", action)],
        )
    }

    /// Topic name scoped to one participant.
    #[must_use]
    pub fn participant_topic_name(
        &self,
        participant_name: &str,
        functionality: &str,
        action: &str,
    ) -> String {
        render(
            &self.templates.participant,
            &[
                ("{participantName}", participant_name),
                ("{functionality}", functionality),
                ("{action}", action),
            ],
        )
    }

    /// Descriptor for a general topic.
    ///
    /// `key` becomes the partition key; `partition` pins an explicit partition.
    #[must_use]
    pub fn topic_for(
        &self,
        functionality: &str,
        action: &str,
        partition: Option<i32>,
        key: Option<&str>,
    ) -> TopicDescriptor {
        TopicDescriptor {
            topic_name: self.general_topic_name(functionality, action),
            key: key.map(str::to_string),
            partition,
        }
    }

    /// Descriptor for a participant topic.
    #[must_use]
    pub fn participant_topic_for(
        &self,
        participant_name: &str,
        functionality: &str,
        action: &str,
        key: Option<&str>,
    ) -> TopicDescriptor {
        TopicDescriptor {
            topic_name: self.participant_topic_name(participant_name, functionality, action),
            key: key.map(str::to_string),
            partition: None,
        }
    }

    /// Client config registered for `(flow, functionality, action)`.
    pub fn producer_config_for(
        &self,
        flow: Flow,
        functionality: &str,
        action: &str,
    ) -> Result<ProducerConfig, TopicConfigError> {
        let key = config_key(flow, functionality, action);
        self.configs
            .get(&key)
            .cloned()
            .ok_or(TopicConfigError::MissingConfig {
                flow,
                functionality: key.1,
                action: key.2,
            })
    }
}
