//! HTTP ingest sink: one binary POST per image, metadata in headers.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use std::time::Duration;

use super::retry::{with_retry, RetryPolicy};
use super::StreamSink;
use crate::config::HttpConfig;
use crate::error::DeliveryError;
use crate::types::OutboundMessage;

/// Header carrying the original file name.
pub const FILENAME_HEADER: &str = "x-microsim-filename";
/// Header carrying the JSON-encoded message metadata.
pub const METADATA_HEADER: &str = "x-microsim-metadata";

/// Posts images to an HTTP endpoint.
pub struct HttpSink {
    endpoint: Url,
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpSink {
    /// Validate the endpoint and build the client, probing it when configured.
    ///
    /// Any HTTP response to the probe counts as reachable; only a connection
    /// failure aborts startup.
    pub async fn connect(config: &HttpConfig) -> Result<Self, DeliveryError> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            DeliveryError::Fatal(format!("invalid HTTP endpoint '{}': {e}", config.endpoint))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| DeliveryError::Fatal(format!("cannot build HTTP client: {e}")))?;

        if config.probe_on_connect {
            match client.head(endpoint.clone()).send().await {
                Ok(resp) => tracing::debug!("HTTP probe of {endpoint} answered {}", resp.status()),
                Err(e) => {
                    return Err(DeliveryError::Fatal(format!(
                        "cannot reach HTTP endpoint {endpoint}: {e}"
                    )))
                }
            }
        }

        tracing::info!("HTTP sink ready at {endpoint}");

        Ok(Self {
            endpoint,
            client,
            policy: RetryPolicy::fixed(config.retry_attempts, config.retry_delay_ms),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post(&self, message: &OutboundMessage, headers: HeaderMap) -> Result<(), DeliveryError> {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .headers(headers)
            .body(message.payload.clone())
            .send()
            .await
            .map_err(|e| DeliveryError::Transient {
                file_name: message.file_name.clone(),
                message: format!("request failed: {e}"),
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        let text = format!("HTTP {status}: {}", body.trim());
        if is_retryable_status(status) {
            Err(DeliveryError::Transient {
                file_name: message.file_name.clone(),
                message: text,
            })
        } else {
            Err(DeliveryError::Rejected {
                file_name: message.file_name.clone(),
                message: text,
                status_code: Some(status.as_u16()),
            })
        }
    }
}

/// Rate limits and server errors may clear on their own.
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn build_headers(message: &OutboundMessage) -> Result<HeaderMap, DeliveryError> {
    let invalid = |what: &str, e: &dyn std::fmt::Display| DeliveryError::Rejected {
        file_name: message.file_name.clone(),
        message: format!("cannot encode {what} header: {e}"),
        status_code: None,
    };

    let metadata = message.metadata_json().map_err(|e| invalid("metadata", &e))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        FILENAME_HEADER,
        HeaderValue::from_str(&message.file_name).map_err(|e| invalid("filename", &e))?,
    );
    headers.insert(
        METADATA_HEADER,
        HeaderValue::from_str(&metadata).map_err(|e| invalid("metadata", &e))?,
    );
    Ok(headers)
}

#[async_trait]
impl StreamSink for HttpSink {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let headers = build_headers(message)?;
        let label = format!("POST of {}", message.file_name);

        let result = with_retry(&self.policy, &label, |_| {
            let headers = headers.clone();
            async move { self.post(message, headers).await }
        })
        .await;

        match &result {
            Ok(()) => tracing::debug!(
                "Posted {} ({} bytes) to {}",
                message.file_name,
                message.payload.len(),
                self.endpoint
            ),
            Err(e) => tracing::error!("Giving up on {}: {e}", message.file_name),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FileInfo, FileRecord, StreamId};
    use axum::body::Bytes;
    use axum::http::{HeaderMap as AxumHeaders, StatusCode as AxumStatus};
    use axum::routing::post;
    use axum::Router;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Received {
        calls: AtomicU32,
        bodies: Mutex<Vec<(String, String, usize)>>,
    }

    /// Serve `status` for every POST on a random local port.
    async fn serve(status: AxumStatus) -> (String, Arc<Received>) {
        let received = Arc::new(Received::default());
        let state = received.clone();
        let app = Router::new().route(
            "/images",
            post(move |headers: AxumHeaders, body: Bytes| {
                let state = state.clone();
                async move {
                    state.calls.fetch_add(1, Ordering::SeqCst);
                    let header = |name: &str| {
                        headers
                            .get(name)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string()
                    };
                    state.bodies.lock().unwrap().push((
                        header(FILENAME_HEADER),
                        header(METADATA_HEADER),
                        body.len(),
                    ));
                    status
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/images"), received)
    }

    fn config(endpoint: String) -> HttpConfig {
        HttpConfig {
            endpoint,
            retry_delay_ms: 5,
            ..HttpConfig::default()
        }
    }

    fn message() -> OutboundMessage {
        let record = FileRecord {
            file_name: "plate_B02_T0001F001L01A01Z01C01.tif".to_string(),
            info: FileInfo::new(1, "B02", 1, "1"),
            full_path: PathBuf::from("/data/plate_B02_T0001F001L01A01Z01C01.tif"),
        };
        OutboundMessage::new(&record, &StreamId::generate("http"), vec![7u8; 64])
    }

    #[tokio::test]
    async fn test_post_delivers_payload_and_headers() {
        let (endpoint, received) = serve(AxumStatus::OK).await;
        let sink = HttpSink::connect(&config(endpoint)).await.unwrap();

        sink.send(&message()).await.unwrap();

        let bodies = received.bodies.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        let (file_name, metadata, len) = &bodies[0];
        assert_eq!(file_name, "plate_B02_T0001F001L01A01Z01C01.tif");
        assert_eq!(*len, 64);
        let metadata: serde_json::Value = serde_json::from_str(metadata).unwrap();
        assert_eq!(metadata["substream_id"], "B02");
        assert_eq!(metadata["image_length_bytes"], 64);
    }

    #[tokio::test]
    async fn test_client_error_is_rejected_without_retry() {
        let (endpoint, received) = serve(AxumStatus::PAYLOAD_TOO_LARGE).await;
        let mut cfg = config(endpoint);
        cfg.retry_attempts = 3;
        let sink = HttpSink::connect(&cfg).await.unwrap();

        let err = sink.send(&message()).await.unwrap_err();
        assert!(matches!(
            err,
            DeliveryError::Rejected {
                status_code: Some(413),
                ..
            }
        ));
        assert_eq!(received.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_error_retried_per_policy() {
        let (endpoint, received) = serve(AxumStatus::SERVICE_UNAVAILABLE).await;
        let mut cfg = config(endpoint);
        cfg.retry_attempts = 1;
        let sink = HttpSink::connect(&cfg).await.unwrap();

        let err = sink.send(&message()).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(received.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_default_policy_does_not_retry() {
        let (endpoint, received) = serve(AxumStatus::INTERNAL_SERVER_ERROR).await;
        let sink = HttpSink::connect(&config(endpoint)).await.unwrap();

        assert!(sink.send(&message()).await.is_err());
        assert_eq!(received.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_url() {
        let err = HttpSink::connect(&config("not a url".to_string()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DeliveryError::Fatal(_)));
    }

    #[tokio::test]
    async fn test_connect_fails_when_unreachable() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = HttpSink::connect(&config(format!("http://{addr}/images")))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DeliveryError::Fatal(_)));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
    }
}
