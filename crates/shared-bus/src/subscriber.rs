//! # Record Subscriber
//!
//! Defines the subscription side of the in-memory backbone. Downstream
//! consumers in the same process (and tests) observe accepted records here.

use crate::publisher::PublishedRecord;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The backbone was closed.
    #[error("Message bus closed")]
    Closed,
}

/// Filter for subscribing to specific records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<String>,
    /// Partition key to include. `None` means any key.
    pub key: Option<String>,
}

impl RecordFilter {
    /// Create a filter that accepts all records.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for one topic.
    #[must_use]
    pub fn topic(topic: impl Into<String>) -> Self {
        Self {
            topics: vec![topic.into()],
            key: None,
        }
    }

    /// Narrow the filter to one partition key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Check if a record matches this filter.
    #[must_use]
    pub fn matches(&self, record: &PublishedRecord) -> bool {
        let topic_match = self.topics.is_empty() || self.topics.contains(&record.topic);
        let key_match = match &self.key {
            Some(key) => record.key.as_deref() == Some(key.as_str()),
            None => true,
        };
        topic_match && key_match
    }

    /// Short description used in logs.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{:?}/{:?}", self.topics, self.key)
    }
}

/// Trait for subscribing to accepted records.
pub trait RecordSubscriber: Send + Sync {
    /// Subscribe to records matching a filter.
    fn subscribe(&self, filter: RecordFilter) -> Subscription;
}

/// A subscription handle for receiving records.
///
/// Dropping it (or the stream made from it) releases the receiver.
pub struct Subscription {
    receiver: broadcast::Receiver<PublishedRecord>,
    filter: RecordFilter,
}

impl Subscription {
    pub(crate) fn new(receiver: broadcast::Receiver<PublishedRecord>, filter: RecordFilter) -> Self {
        Self { receiver, filter }
    }

    /// Receive the next record that matches the filter.
    ///
    /// Returns `None` once the bus is dropped.
    pub async fn recv(&mut self) -> Option<PublishedRecord> {
        loop {
            let record = match self.receiver.recv().await {
                Ok(r) => r,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Subscriber lagged, some records skipped");
                    continue;
                }
            };

            if self.filter.matches(&record) {
                return Some(record);
            }
        }
    }

    /// Try to receive the next record without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))` - A matching record was available
    /// - `Ok(None)` - Nothing available right now
    /// - `Err(SubscriptionError::Closed)` - The bus was dropped
    pub fn try_recv(&mut self) -> Result<Option<PublishedRecord>, SubscriptionError> {
        loop {
            let record = match self.receiver.try_recv() {
                Ok(r) => r,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&record) {
                return Ok(Some(record));
            }
        }
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn filter(&self) -> &RecordFilter {
        &self.filter
    }

    /// Turn the subscription into a `Stream` of matching records.
    #[must_use]
    pub fn into_stream(self) -> RecordStream {
        let Self { receiver, filter } = self;

        let inner = BroadcastStream::new(receiver).filter_map(move |item| match item {
            Ok(record) if filter.matches(&record) => Some(record),
            Ok(_) => None,
            Err(lagged) => {
                debug!(error = %lagged, "Record stream lagged");
                None
            }
        });

        RecordStream {
            inner: Box::pin(inner),
        }
    }
}

/// A stream of records matching a filter.
pub struct RecordStream {
    inner: Pin<Box<dyn Stream<Item = PublishedRecord> + Send>>,
}

impl Stream for RecordStream {
    type Item = PublishedRecord;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.as_mut().poll_next(cx)
    }
}
