//! Sub-configuration structs with defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which stream sink a run delivers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Dry run: images are prepared but not delivered
    #[default]
    None,
    /// Kafka topic
    Queue,
    /// HTTP ingest endpoint
    Http,
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkKind::None => write!(f, "none"),
            SinkKind::Queue => write!(f, "queue"),
            SinkKind::Http => write!(f, "http"),
        }
    }
}

/// Stream pacing and selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Seconds to wait after each image before sending the next (0 = fastest)
    pub period_secs: f64,

    /// N×N binning factor; `None` sends the files unchanged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binning: Option<u32>,

    /// Color channels to send; empty sends every channel
    pub color_channels: Vec<String>,

    /// Tag appended to the timestamp in the stream ID
    pub stream_id_tag: String,

    /// Where images are delivered
    pub sink: SinkKind,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            period_secs: 0.0,
            binning: None,
            color_channels: Vec::new(),
            stream_id_tag: "ll".to_string(),
            sink: SinkKind::None,
        }
    }
}

impl StreamConfig {
    /// The pacing period as a `Duration`.
    ///
    /// Negative or non-finite values collapse to zero; `validate()` rejects them
    /// before a run starts.
    pub fn period(&self) -> Duration {
        Duration::try_from_secs_f64(self.period_secs).unwrap_or(Duration::ZERO)
    }
}

/// Kafka producer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Comma-separated `host:port` bootstrap list
    pub bootstrap_servers: String,

    /// Topic that receives the images
    pub topic: String,

    /// Largest message the producer will accept, in bytes
    pub max_message_size: usize,

    /// Per-message delivery timeout in milliseconds
    pub message_timeout_ms: u64,

    /// Broker metadata probe timeout at startup, in milliseconds
    pub connect_timeout_ms: u64,

    /// Retries after a transient fault (leader not available)
    pub retry_attempts: u32,

    /// Delay before each retry in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".to_string(),
            topic: "microscope".to_string(),
            max_message_size: 10 * 1024 * 1024,
            message_timeout_ms: 30_000,
            connect_timeout_ms: 5_000,
            retry_attempts: 1,
            retry_delay_ms: 1000,
        }
    }
}

/// HTTP ingest settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// URL that receives one POST per image
    pub endpoint: String,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// Retries after a transient fault (connection error, 429, 5xx)
    pub retry_attempts: u32,

    /// Delay before each retry in milliseconds
    pub retry_delay_ms: u64,

    /// Send a HEAD request at startup to fail fast on an unreachable endpoint
    pub probe_on_connect: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/images".to_string(),
            timeout_ms: 30_000,
            retry_attempts: 0,
            retry_delay_ms: 1000,
            probe_on_connect: true,
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size in megabytes
    pub max_file_size_mb: u64,

    /// Decode + binning timeout in milliseconds
    pub decode_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 512,
            decode_timeout_ms: 30_000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
