//! Message-queue sink: one broker message per image, keyed by file name.
//!
//! The broker itself sits behind [`BrokerClient`] so the retry policy can be
//! exercised without a running cluster; the Kafka client lives in
//! `sink::kafka`.

use async_trait::async_trait;
use thiserror::Error;

use super::retry::{with_retry, RetryPolicy};
use super::StreamSink;
use crate::error::DeliveryError;
use crate::types::OutboundMessage;

/// A message as handed to the broker.
#[derive(Debug, Clone, Copy)]
pub struct BrokerRecord<'a> {
    pub topic: &'a str,
    pub key: &'a [u8],
    pub payload: &'a [u8],
    /// JSON-encoded `MessageMetadata`, sent as the `metadata` header
    pub metadata: &'a [u8],
}

/// Failure reported by a broker client for a single send.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Leader-not-available class of fault: expected to clear shortly
    #[error("transient broker fault: {0}")]
    Transient(String),

    /// Anything else (message too large, authorization, ...)
    #[error("broker rejected message: {0}")]
    Rejected(String),
}

/// Capability to publish one record to a broker.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Short name for logs (e.g. "kafka").
    fn name(&self) -> &str;

    /// Publish a record and wait for the broker's acknowledgement.
    async fn send(&self, record: BrokerRecord<'_>) -> Result<(), BrokerError>;
}

/// Delivers images to a broker topic with bounded retry on transient faults.
pub struct QueueSink {
    client: Box<dyn BrokerClient>,
    topic: String,
    policy: RetryPolicy,
}

impl QueueSink {
    /// Wrap a connected broker client. Uses the default one-retry policy.
    pub fn new(client: Box<dyn BrokerClient>, topic: impl Into<String>) -> Self {
        Self {
            client,
            topic: topic.into(),
            policy: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl StreamSink for QueueSink {
    fn name(&self) -> &str {
        self.client.name()
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let metadata = message
            .metadata_json()
            .map_err(|e| DeliveryError::Rejected {
                file_name: message.file_name.clone(),
                message: format!("cannot encode metadata: {e}"),
                status_code: None,
            })?;

        let record = BrokerRecord {
            topic: &self.topic,
            key: message.file_name.as_bytes(),
            payload: &message.payload,
            metadata: metadata.as_bytes(),
        };

        let label = format!("{} send of {}", self.client.name(), message.file_name);
        let result = with_retry(&self.policy, &label, |_| async move {
            self.client.send(record).await.map_err(|e| match e {
                BrokerError::Transient(msg) => DeliveryError::Transient {
                    file_name: message.file_name.clone(),
                    message: msg,
                },
                BrokerError::Rejected(msg) => DeliveryError::Rejected {
                    file_name: message.file_name.clone(),
                    message: msg,
                    status_code: None,
                },
            })
        })
        .await;

        match &result {
            Ok(()) => tracing::debug!(
                "Sent {} ({} bytes) to topic {}",
                message.file_name,
                message.payload.len(),
                self.topic
            ),
            Err(e) => tracing::error!("Giving up on {}: {e}", message.file_name),
        }
        result
    }
}
