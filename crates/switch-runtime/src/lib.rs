//! # Switch Runtime
//!
//! Wires the transfer prepare publisher into a running process:
//!
//! ```text
//! SwitchConfig ──→ HttpAddressResolver ─┐
//!              ──→ TopicResolver ───────┼──→ PrepareService ──→ axum Router
//!              ──→ MessageProducer ─────┘
//! ```
//!
//! The backbone is Kafka when brokers are configured (feature `kafka`),
//! otherwise the in-memory bus.

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod http;
pub mod telemetry;

pub use config::{ConfigError, SwitchConfig};
pub use telemetry::{init_tracing, TelemetryConfig, TelemetryError};

use axum::Router;
use shared_bus::{InMemoryMessageBus, MessageProducer, TopicConfigError};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use transfer_prepare::{HttpAddressResolver, PrepareService, ResolutionError};

/// Runtime start-up and serving errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Directory client could not be built
    #[error("directory client: {0}")]
    Directory(#[from] ResolutionError),
    /// Topic templates or producer config rejected
    #[error("topic configuration: {0}")]
    Topics(#[from] TopicConfigError),
    /// Brokers configured but Kafka support not compiled in
    #[error("kafka brokers '{0}' configured but the kafka feature is disabled")]
    KafkaDisabled(String),
    /// HTTP server failure
    #[error("http server: {0}")]
    Io(#[from] std::io::Error),
}

/// A wired transfer switch.
pub struct SwitchRuntime {
    config: SwitchConfig,
    service: Arc<PrepareService>,
    producer: Arc<dyn MessageProducer>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl SwitchRuntime {
    /// Validate the config and build every collaborator.
    pub fn new(config: SwitchConfig) -> Result<Self, RuntimeError> {
        config.validate()?;

        let resolver = Arc::new(HttpAddressResolver::new(config.directory_client())?);
        let topics = Arc::new(config.topic_resolver()?);
        let producer = build_producer(&config)?;

        let service = PrepareService::new(resolver, Arc::clone(&producer), topics)
            .with_envelope_builder(
                transfer_prepare::EnvelopeBuilder::default().with_rule(config.destination_rule()),
            )
            .with_retry_policy(config.retry_policy())
            .with_deadline(config.prepare_deadline());

        info!(
            directory = %config.directory.base_url,
            kafka = config.uses_kafka(),
            retry = ?config.retry_policy(),
            "Transfer switch wired"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            config,
            service: Arc::new(service),
            producer,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &SwitchConfig {
        &self.config
    }

    /// The prepare service.
    pub fn service(&self) -> Arc<PrepareService> {
        Arc::clone(&self.service)
    }

    /// HTTP ingress router.
    pub fn router(&self) -> Router {
        http::router(self.service())
    }

    /// Serve HTTP on `listener` until [`SwitchRuntime::shutdown`] is called.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), RuntimeError> {
        let mut shutdown = self.shutdown_rx.clone();
        info!(addr = ?listener.local_addr().ok(), "HTTP ingress listening");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await?;
        info!("HTTP ingress stopped");
        Ok(())
    }

    /// Stop serving and flush the backbone producer.
    pub async fn shutdown(&self) {
        info!("Shutting down transfer switch");
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.producer.disconnect(None).await {
            warn!(error = %e, "Producer disconnect failed");
        }
        info!(
            published = self.service.prepares_published(),
            failed = self.service.prepares_failed(),
            "Transfer switch stopped"
        );
    }
}

fn build_producer(config: &SwitchConfig) -> Result<Arc<dyn MessageProducer>, RuntimeError> {
    if config.uses_kafka() {
        return kafka_producer(config);
    }
    info!("No Kafka brokers configured, using in-memory backbone");
    Ok(Arc::new(
        InMemoryMessageBus::new()
            .with_max_message_bytes(config.kafka.max_message_bytes)
            .with_retention(config.kafka.retained_records),
    ))
}

#[cfg(feature = "kafka")]
fn kafka_producer(config: &SwitchConfig) -> Result<Arc<dyn MessageProducer>, RuntimeError> {
    info!(brokers = %config.kafka.brokers, "Using Kafka backbone");
    Ok(Arc::new(shared_bus::KafkaMessageProducer::new()))
}

#[cfg(not(feature = "kafka"))]
fn kafka_producer(config: &SwitchConfig) -> Result<Arc<dyn MessageProducer>, RuntimeError> {
    Err(RuntimeError::KafkaDisabled(config.kafka.brokers.clone()))
}
