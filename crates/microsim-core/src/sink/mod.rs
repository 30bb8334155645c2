//! Stream sinks: where prepared images are delivered.
//!
//! Every backend implements [`StreamSink`]; [`SinkFactory`] picks one from
//! the configured [`SinkKind`]:
//! - **queue**: Kafka topic via [`QueueSink`] over a [`BrokerClient`]
//! - **http**: binary POST via [`HttpSink`]
//! - **none**: dry run, no sink is built

pub mod http;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod queue;
pub mod retry;

pub use http::HttpSink;
#[cfg(feature = "kafka")]
pub use kafka::KafkaBroker;
pub use queue::{BrokerClient, BrokerError, BrokerRecord, QueueSink};
pub use retry::{with_retry, RetryPolicy};

use async_trait::async_trait;

use crate::config::{Config, SinkKind};
use crate::error::DeliveryError;
use crate::types::OutboundMessage;

/// Capability every delivery backend implements.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (the controller holds a `Box<dyn StreamSink>`).
#[async_trait]
pub trait StreamSink: Send + Sync {
    /// Backend name for logging (e.g. "kafka", "http").
    fn name(&self) -> &str;

    /// Deliver one image and its metadata.
    ///
    /// Transient faults are retried according to the sink's policy before an
    /// error is returned. Errors are per message: the caller logs them and
    /// moves on to the next file.
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError>;
}

/// Builds the sink selected by configuration.
pub struct SinkFactory;

impl SinkFactory {
    /// Connect the configured sink; `Ok(None)` means dry run.
    ///
    /// Construction errors (bad URL, unreachable broker) are
    /// `DeliveryError::Fatal` and must abort the run.
    pub async fn create(
        kind: SinkKind,
        config: &Config,
    ) -> Result<Option<Box<dyn StreamSink>>, DeliveryError> {
        match kind {
            SinkKind::None => {
                tracing::info!("No sink configured: dry run");
                Ok(None)
            }
            SinkKind::Http => Ok(Some(Box::new(HttpSink::connect(&config.http).await?))),
            SinkKind::Queue => Self::create_queue(config).await.map(Some),
        }
    }

    #[cfg(feature = "kafka")]
    async fn create_queue(config: &Config) -> Result<Box<dyn StreamSink>, DeliveryError> {
        let broker = KafkaBroker::connect(&config.kafka).await?;
        let sink = QueueSink::new(Box::new(broker), config.kafka.topic.clone()).with_policy(
            RetryPolicy::fixed(config.kafka.retry_attempts, config.kafka.retry_delay_ms),
        );
        Ok(Box::new(sink))
    }

    #[cfg(not(feature = "kafka"))]
    async fn create_queue(_config: &Config) -> Result<Box<dyn StreamSink>, DeliveryError> {
        Err(DeliveryError::Fatal(
            "queue sink requested but microsim was built without the `kafka` feature".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_factory_none_is_dry_run() {
        let sink = SinkFactory::create(SinkKind::None, &Config::default())
            .await
            .unwrap();
        assert!(sink.is_none());
    }

    #[tokio::test]
    async fn test_factory_http_with_bad_url_is_fatal() {
        let mut config = Config::default();
        config.http.endpoint = "::not-a-url::".to_string();
        let err = SinkFactory::create(SinkKind::Http, &config)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DeliveryError::Fatal(_)));
    }

    #[tokio::test]
    async fn test_factory_http_without_probe_builds_sink() {
        let mut config = Config::default();
        config.http.probe_on_connect = false;
        let sink = SinkFactory::create(SinkKind::Http, &config)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sink.name(), "http");
    }
}
