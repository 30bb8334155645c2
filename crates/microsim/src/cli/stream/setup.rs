//! Stream setup: fold CLI flags into the config and validate the result.

use microsim_core::{Config, SinkKind, StreamOptions};
use std::collections::BTreeSet;

use super::StreamArgs;
use crate::cli::{parse_channels, parse_wells};

/// Apply command-line overrides and return the run options.
///
/// The merged config is validated here, so a bad flag combination (queue
/// sink without a topic, etc.) fails before anything connects.
pub fn apply_overrides(args: &StreamArgs, config: &mut Config) -> anyhow::Result<StreamOptions> {
    if let Some(period) = args.period {
        config.stream.period_secs = period;
    }
    if args.binning.is_some() {
        config.stream.binning = args.binning;
    }
    if let Some(channels) = &args.channels {
        config.stream.color_channels = parse_channels(channels)
            .map(|filter| {
                let channels: Vec<String> = filter.iter().map(str::to_string).collect();
                channels
            })
            .unwrap_or_default();
    }
    if let Some(tag) = &args.tag {
        config.stream.stream_id_tag = tag.clone();
    }

    if args.dry_run {
        config.stream.sink = SinkKind::None;
    } else if let Some(sink) = args.sink {
        config.stream.sink = sink.into();
    }

    if let Some(servers) = &args.bootstrap_servers {
        config.kafka.bootstrap_servers = servers.clone();
    }
    if let Some(topic) = &args.topic {
        config.kafka.topic = topic.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        config.http.endpoint = endpoint.clone();
    }
    if let Some(retries) = args.retries {
        config.kafka.retry_attempts = retries;
        config.http.retry_attempts = retries;
    }

    config.validate()?;

    tracing::debug!(
        "Streaming with sink={}, period={}s, binning={:?}",
        config.stream.sink,
        config.stream.period_secs,
        config.stream.binning
    );

    Ok(StreamOptions::from_config(config))
}

/// Wells selected with `--wells`, if any.
pub fn well_filter(args: &StreamArgs) -> Option<BTreeSet<String>> {
    args.wells.as_deref().and_then(parse_wells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::stream::SinkArg;
    use std::time::Duration;

    #[test]
    fn test_flags_override_config() {
        let mut config = Config::default();
        let args = StreamArgs {
            period: Some(2.5),
            binning: Some(2),
            channels: Some("01, 3".to_string()),
            tag: Some("scope7".to_string()),
            ..StreamArgs::default()
        };

        let options = apply_overrides(&args, &mut config).unwrap();
        assert_eq!(options.period, Duration::from_millis(2500));
        assert_eq!(options.binning, Some(2));
        assert_eq!(options.stream_id_tag, "scope7");
        let filter = options.channel_filter.unwrap();
        assert!(filter.contains("1"));
        assert!(filter.contains("3"));
        assert!(!filter.contains("2"));
    }

    #[test]
    fn test_config_kept_when_flags_absent() {
        let mut config = Config::default();
        config.stream.period_secs = 4.0;
        config.stream.binning = Some(8);

        let options = apply_overrides(&StreamArgs::default(), &mut config).unwrap();
        assert_eq!(options.period, Duration::from_secs(4));
        assert_eq!(options.binning, Some(8));
        assert!(options.channel_filter.is_none());
    }

    #[test]
    fn test_dry_run_forces_no_sink() {
        let mut config = Config::default();
        config.stream.sink = SinkKind::Http;
        let args = StreamArgs {
            dry_run: true,
            ..StreamArgs::default()
        };

        apply_overrides(&args, &mut config).unwrap();
        assert_eq!(config.stream.sink, SinkKind::None);
    }

    #[test]
    fn test_http_sink_without_endpoint_is_rejected() {
        let mut config = Config::default();
        config.http.endpoint.clear();
        let args = StreamArgs {
            sink: Some(SinkArg::Http),
            ..StreamArgs::default()
        };
        assert!(apply_overrides(&args, &mut config).is_err());

        let args = StreamArgs {
            sink: Some(SinkArg::Http),
            endpoint: Some("http://localhost:8080/images".to_string()),
            retries: Some(2),
            ..StreamArgs::default()
        };
        apply_overrides(&args, &mut config).unwrap();
        assert_eq!(config.http.retry_attempts, 2);
        assert_eq!(config.kafka.retry_attempts, 2);
    }

    #[test]
    fn test_empty_channel_list_overrides_config_with_all_channels() {
        let mut config = Config::default();
        config.stream.color_channels = vec!["2".to_string()];
        let args = StreamArgs {
            channels: Some(",".to_string()),
            ..StreamArgs::default()
        };

        let options = apply_overrides(&args, &mut config).unwrap();
        assert!(options.channel_filter.is_none());
    }

    #[test]
    fn test_well_filter() {
        let args = StreamArgs {
            wells: Some("b02".to_string()),
            ..StreamArgs::default()
        };
        assert!(well_filter(&args).unwrap().contains("B02"));
        assert!(well_filter(&StreamArgs::default()).is_none());
    }
}
