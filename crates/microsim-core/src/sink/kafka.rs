//! Kafka broker client backed by librdkafka.

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use std::time::Duration;

use super::queue::{BrokerClient, BrokerError, BrokerRecord};
use crate::config::KafkaConfig;
use crate::error::DeliveryError;

/// Kafka producer that publishes each image as one message.
pub struct KafkaBroker {
    producer: FutureProducer,
    queue_timeout: Duration,
}

impl KafkaBroker {
    /// Create the producer and probe the cluster for `config.topic`.
    ///
    /// An unreachable broker is reported as `DeliveryError::Fatal` so the run
    /// aborts before streaming starts.
    pub async fn connect(config: &KafkaConfig) -> Result<Self, DeliveryError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("message.max.bytes", config.max_message_size.to_string())
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .create()
            .map_err(|e| DeliveryError::Fatal(format!("cannot create Kafka producer: {e}")))?;

        let probe = producer.clone();
        let topic = config.topic.clone();
        let timeout = Duration::from_millis(config.connect_timeout_ms);
        tokio::task::spawn_blocking(move || probe.client().fetch_metadata(Some(topic.as_str()), timeout))
            .await
            .map_err(|e| DeliveryError::Fatal(format!("Kafka probe task failed: {e}")))?
            .map_err(|e| {
                DeliveryError::Fatal(format!(
                    "cannot reach Kafka at {}: {e}",
                    config.bootstrap_servers
                ))
            })?;

        tracing::info!(
            "Connected to Kafka at {} (topic {})",
            config.bootstrap_servers,
            config.topic
        );

        Ok(Self {
            producer,
            queue_timeout: Duration::from_millis(config.message_timeout_ms),
        })
    }
}

#[async_trait]
impl BrokerClient for KafkaBroker {
    fn name(&self) -> &str {
        "kafka"
    }

    async fn send(&self, record: BrokerRecord<'_>) -> Result<(), BrokerError> {
        let headers = OwnedHeaders::new().insert(Header {
            key: "metadata",
            value: Some(record.metadata),
        });
        let kafka_record = FutureRecord::to(record.topic)
            .key(record.key)
            .payload(record.payload)
            .headers(headers);

        match self.producer.send(kafka_record, self.queue_timeout).await {
            Ok((partition, offset)) => {
                tracing::trace!("Kafka ack: partition {partition}, offset {offset}");
                Ok(())
            }
            Err((e, _)) => Err(classify(&e)),
        }
    }
}

/// Map a producer error onto the transient / rejected split.
fn classify(error: &KafkaError) -> BrokerError {
    match error.rdkafka_error_code() {
        Some(code) if is_transient(code) => BrokerError::Transient(error.to_string()),
        _ => BrokerError::Rejected(error.to_string()),
    }
}

fn is_transient(code: RDKafkaErrorCode) -> bool {
    matches!(
        code,
        RDKafkaErrorCode::LeaderNotAvailable
            | RDKafkaErrorCode::NotLeaderForPartition
            | RDKafkaErrorCode::QueueFull
    )
}
