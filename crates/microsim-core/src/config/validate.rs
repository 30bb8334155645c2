//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::{Config, SinkKind};

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.stream.period_secs.is_finite() || self.stream.period_secs < 0.0 {
            return Err(ConfigError::ValidationError(
                "stream.period_secs must be a non-negative number".into(),
            ));
        }
        if self.stream.binning == Some(0) {
            return Err(ConfigError::ValidationError(
                "stream.binning must be > 0".into(),
            ));
        }
        if let Some(channel) = self
            .stream
            .color_channels
            .iter()
            .find(|c| c.is_empty() || !c.chars().all(|ch| ch.is_ascii_digit()))
        {
            return Err(ConfigError::ValidationError(format!(
                "stream.color_channels entry '{channel}' is not a channel number"
            )));
        }
        if self.kafka.max_message_size == 0 {
            return Err(ConfigError::ValidationError(
                "kafka.max_message_size must be > 0".into(),
            ));
        }
        if self.kafka.message_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "kafka.message_timeout_ms must be > 0".into(),
            ));
        }
        if self.stream.sink == SinkKind::Queue {
            if self.kafka.bootstrap_servers.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "kafka.bootstrap_servers must be set when stream.sink = \"queue\"".into(),
                ));
            }
            if self.kafka.topic.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "kafka.topic must be set when stream.sink = \"queue\"".into(),
                ));
            }
        }
        if self.stream.sink == SinkKind::Http && self.http.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "http.endpoint must be set when stream.sink = \"http\"".into(),
            ));
        }
        if self.http.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "http.timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}
