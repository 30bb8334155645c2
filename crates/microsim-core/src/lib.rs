//! Microsim Core - simulate a microscope by streaming a plate directory.
//!
//! Images named with the plate/well/time/field/channel convention are
//! catalogued, ordered the way the instrument would have produced them,
//! optionally binned, and sent one at a time to a message queue or HTTP
//! endpoint at a fixed pace.
//!
//! ```text
//! Directory → Catalog (parse + order) → Prepare (raw | N×N binning) → Sink
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use microsim_core::{accept_all, Config, StreamController, StreamOptions};
//!
//! #[tokio::main]
//! async fn main() -> microsim_core::Result<()> {
//!     let config = Config::load()?;
//!     let mut controller = StreamController::from_config(&config).await?;
//!     let options = StreamOptions::from_config(&config);
//!
//!     let report = controller.run("./plate".as_ref(), &options, accept_all).await?;
//!     println!("stream {} sent {} images", report.stream_id, report.stats.sent);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod codec;
pub mod config;
pub mod controller;
pub mod error;
pub mod output;
pub mod sink;
pub mod types;

pub use catalog::{accept_all, AznFilenameParser, ChannelFilter, FileCatalog, FilenameParser};
pub use codec::ImageCodec;
pub use config::{Config, SinkKind};
pub use controller::{
    Delivery, StreamController, StreamEvent, StreamOptions, StreamOutcome, StreamReport,
    StreamState, StreamStats,
};
pub use error::{CatalogError, CodecError, ConfigError, DeliveryError, Result, SimError};
pub use output::{ManifestEntry, OutputFormat, OutputWriter};
pub use sink::{HttpSink, QueueSink, RetryPolicy, SinkFactory, StreamSink};
pub use types::{FileInfo, FileRecord, MessageMetadata, OutboundMessage, StreamId, StreamSession};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
