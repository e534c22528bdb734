//! Logging bootstrap.
//!
//! `RUST_LOG` selects levels (default `info`). `SW_JSON_LOGS=true` switches
//! to JSON lines for log shippers.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable enabling JSON output.
pub const JSON_LOGS_ENV: &str = "SW_JSON_LOGS";

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Fallback filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON lines instead of human readable output
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Defaults, with `SW_JSON_LOGS` applied.
    pub fn from_env() -> Self {
        Self {
            json_logs: std::env::var(JSON_LOGS_ENV)
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
            ..Self::default()
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

/// Logging setup errors
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Filter directive could not be parsed
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// A global subscriber was already installed
    #[error("failed to install subscriber: {0}")]
    Init(String),
}

/// Install the global tracing subscriber.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::Filter(e.to_string()))?;

    if config.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
            .map_err(|e| TelemetryError::Init(e.to_string()))
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
            .map_err(|e| TelemetryError::Init(e.to_string()))
    }
}
