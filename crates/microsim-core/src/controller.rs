//! Stream controller: catalog a directory, then prepare and send each image
//! at the configured pace.
//!
//! A run moves through `Initializing → Cataloging → Streaming` and ends in
//! `Completed` or `Cancelled`. Per-file failures (bad image, refused
//! delivery) are logged and counted; they never end the run early.

use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::catalog::{ChannelFilter, FileCatalog};
use crate::codec::ImageCodec;
use crate::config::Config;
use crate::error::Result;
use crate::sink::{SinkFactory, StreamSink};
use crate::types::{FileInfo, MessageMetadata, OutboundMessage, StreamId, StreamSession};

/// Per-run options.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Wait after each image before the next one
    pub period: Duration,
    /// N×N binning; `None` sends files unchanged
    pub binning: Option<u32>,
    /// Channels to send; `None` sends every channel
    pub channel_filter: Option<ChannelFilter>,
    /// Suffix of the stream ID
    pub stream_id_tag: String,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            period: Duration::ZERO,
            binning: None,
            channel_filter: None,
            stream_id_tag: "ll".to_string(),
        }
    }
}

impl StreamOptions {
    /// Options taken from the `[stream]` config section.
    pub fn from_config(config: &Config) -> Self {
        Self {
            period: config.stream.period(),
            binning: config.stream.binning,
            channel_filter: ChannelFilter::from_list(&config.stream.color_channels),
            stream_id_tag: config.stream.stream_id_tag.clone(),
        }
    }
}

/// Lifecycle of a controller run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    Initializing,
    Cataloging,
    Streaming,
    Completed,
    Cancelled,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamOutcome {
    /// Every catalogued file was processed
    Completed,
    /// Stopped between files by the cancellation token
    Cancelled,
}

/// What happened to a streamed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Accepted by the sink
    Sent,
    /// Prepared only: no sink configured
    Dry,
    /// Sink reported an error (already retried per its policy)
    Failed(String),
}

/// Progress notifications emitted during a run.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    StateChanged(StreamState),
    /// The ordered file set is known
    Cataloged {
        stream_id: StreamId,
        total: usize,
    },
    /// A message was built and handed to the sink (or dropped in dry mode)
    FileStreamed {
        index: usize,
        total: usize,
        metadata: Box<MessageMetadata>,
        delivery: Delivery,
    },
    /// The image could not be prepared; nothing was sent
    FileSkipped {
        index: usize,
        total: usize,
        file_name: String,
        error: String,
    },
}

/// Counters for a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamStats {
    pub total: usize,
    pub sent: usize,
    pub dry: usize,
    pub failed: usize,
    pub skipped: usize,
    pub bytes: u64,
    pub elapsed: Duration,
}

impl StreamStats {
    /// Files the run got to (sent, dry, failed or skipped).
    pub fn processed(&self) -> usize {
        self.sent + self.dry + self.failed + self.skipped
    }
}

/// Result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct StreamReport {
    pub stream_id: StreamId,
    pub outcome: StreamOutcome,
    pub stats: StreamStats,
}

impl StreamReport {
    /// The stream ID, only when the run completed.
    pub fn completed_stream_id(&self) -> Option<&StreamId> {
        (self.outcome == StreamOutcome::Completed).then_some(&self.stream_id)
    }
}

/// Orchestrates one simulated microscope.
pub struct StreamController {
    catalog: FileCatalog,
    codec: ImageCodec,
    sink: Option<Box<dyn StreamSink>>,
    cancel: CancellationToken,
    state: StreamState,
}

impl StreamController {
    /// Create a controller; `sink = None` runs dry.
    pub fn new(catalog: FileCatalog, codec: ImageCodec, sink: Option<Box<dyn StreamSink>>) -> Self {
        Self {
            catalog,
            codec,
            sink,
            cancel: CancellationToken::new(),
            state: StreamState::Initializing,
        }
    }

    /// Build the controller from config, connecting the configured sink.
    ///
    /// Fails before any file is touched when the sink cannot be reached.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let sink = SinkFactory::create(config.stream.sink, config).await?;
        Ok(Self::new(
            FileCatalog::default(),
            ImageCodec::new(config.limits.clone()),
            sink,
        ))
    }

    /// Use `token` to stop the run between files.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels the run when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_dry_run(&self) -> bool {
        self.sink.is_none()
    }

    /// Stream every matching file in `directory`.
    pub async fn run<P>(
        &mut self,
        directory: &Path,
        options: &StreamOptions,
        predicate: P,
    ) -> Result<StreamReport>
    where
        P: Fn(&FileInfo) -> bool,
    {
        self.run_with_events(directory, options, predicate, |_| {})
            .await
    }

    /// Stream every matching file, reporting progress to `on_event`.
    pub async fn run_with_events<P, F>(
        &mut self,
        directory: &Path,
        options: &StreamOptions,
        predicate: P,
        mut on_event: F,
    ) -> Result<StreamReport>
    where
        P: Fn(&FileInfo) -> bool,
        F: FnMut(StreamEvent),
    {
        let start = Instant::now();

        self.transition(StreamState::Initializing, &mut on_event);
        let stream_id = StreamId::generate(&options.stream_id_tag);
        tracing::info!("Stream ID is {stream_id}");
        if self.sink.is_none() {
            tracing::info!("Dry run: images will be prepared but not sent");
        }

        self.transition(StreamState::Cataloging, &mut on_event);
        let records = self
            .catalog
            .build(directory, options.channel_filter.as_ref(), predicate)?;
        let session = StreamSession::new(stream_id, records, options.period);
        tracing::info!(
            "Streaming {} file(s) from {:?} every {:?}",
            session.len(),
            directory,
            session.period
        );
        on_event(StreamEvent::Cataloged {
            stream_id: session.stream_id.clone(),
            total: session.len(),
        });

        self.transition(StreamState::Streaming, &mut on_event);
        let mut stats = StreamStats {
            total: session.len(),
            ..StreamStats::default()
        };
        let mut outcome = StreamOutcome::Completed;

        for (index, record) in session.records.iter().enumerate() {
            if self.cancel.is_cancelled() {
                outcome = StreamOutcome::Cancelled;
                break;
            }

            match self.codec.prepare(&record.full_path, options.binning).await {
                Ok(payload) => {
                    let message = OutboundMessage::new(record, &session.stream_id, payload);
                    tracing::debug!(
                        "{} has size {}",
                        message.file_name,
                        message.metadata.image_length_bytes
                    );

                    let delivery = match &self.sink {
                        Some(sink) => match sink.send(&message).await {
                            Ok(()) => {
                                stats.sent += 1;
                                stats.bytes += message.payload.len() as u64;
                                Delivery::Sent
                            }
                            Err(e) => {
                                tracing::error!("Failed to deliver {}: {e}", message.file_name);
                                stats.failed += 1;
                                Delivery::Failed(e.to_string())
                            }
                        },
                        None => {
                            stats.dry += 1;
                            Delivery::Dry
                        }
                    };

                    on_event(StreamEvent::FileStreamed {
                        index,
                        total: session.len(),
                        metadata: Box::new(message.metadata),
                        delivery,
                    });
                }
                Err(e) => {
                    tracing::error!("Skipping {}: {e}", record.file_name);
                    stats.skipped += 1;
                    on_event(StreamEvent::FileSkipped {
                        index,
                        total: session.len(),
                        file_name: record.file_name.clone(),
                        error: e.to_string(),
                    });
                }
            }

            if !session.period.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(session.period) => {}
                    _ = self.cancel.cancelled() => {}
                }
            }
        }

        stats.elapsed = start.elapsed();
        let final_state = match outcome {
            StreamOutcome::Completed => StreamState::Completed,
            StreamOutcome::Cancelled => StreamState::Cancelled,
        };
        self.transition(final_state, &mut on_event);

        match outcome {
            StreamOutcome::Completed => tracing::info!(
                "All files streamed: {} sent, {} failed, {} skipped in {:?}",
                stats.sent + stats.dry,
                stats.failed,
                stats.skipped,
                stats.elapsed
            ),
            StreamOutcome::Cancelled => tracing::warn!(
                "Stream cancelled after {}/{} file(s)",
                stats.processed(),
                stats.total
            ),
        }

        Ok(StreamReport {
            stream_id: session.stream_id,
            outcome,
            stats,
        })
    }

    fn transition<F: FnMut(StreamEvent)>(&mut self, state: StreamState, on_event: &mut F) {
        self.state = state;
        tracing::debug!("Stream state: {state:?}");
        on_event(StreamEvent::StateChanged(state));
    }
}
