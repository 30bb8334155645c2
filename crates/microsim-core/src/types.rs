//! Core data types for the streaming simulator.
//!
//! These types carry a file from the catalog through image preparation to the
//! sink: `FileInfo` (parsed from the name), `FileRecord` (a catalogued file),
//! `StreamSession` (one ordered run) and `OutboundMessage` (one delivery).

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Placeholder geolocation attached to every message.
pub const PLACEHOLDER_LOCATION: (f64, f64) = (12.34, 56.78);

/// Fields parsed from an image filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Acquisition time point (T)
    pub time_point_number: u32,

    /// Plate well, e.g. "B02"
    pub well: String,

    /// Imaging field within the well (F)
    pub imaging_point_number: u32,

    /// Color channel number without zero padding, e.g. "1"
    pub color_channel: String,

    /// Plate / assay prefix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plate: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_line_number: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_list_number: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_index: Option<u32>,

    /// File extension as written in the name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

impl FileInfo {
    /// Build a record with only the fields used for ordering and routing.
    pub fn new(
        time_point_number: u32,
        well: impl Into<String>,
        imaging_point_number: u32,
        color_channel: impl Into<String>,
    ) -> Self {
        Self {
            time_point_number,
            well: well.into(),
            imaging_point_number,
            color_channel: color_channel.into(),
            plate: None,
            time_line_number: None,
            action_list_number: None,
            z_index: None,
            extension: None,
        }
    }
}

/// A catalogued image file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Name of the file inside the directory
    pub file_name: String,

    /// Fields parsed from the name
    #[serde(flatten)]
    pub info: FileInfo,

    /// Directory joined with the file name
    pub full_path: PathBuf,
}

impl FileRecord {
    /// Order in which a real microscope emits images: time point, well,
    /// field, channel, with the file name as a final tie-break.
    pub fn stream_order(&self, other: &Self) -> Ordering {
        (
            self.info.time_point_number,
            &self.info.well,
            self.info.imaging_point_number,
            &self.info.color_channel,
            &self.file_name,
        )
            .cmp(&(
                other.info.time_point_number,
                &other.info.well,
                other.info.imaging_point_number,
                &other.info.color_channel,
                &other.file_name,
            ))
    }
}

/// Run-unique label: local timestamp at second precision plus a caller tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    /// Timestamp layout used in stream IDs.
    pub const TIMESTAMP_FORMAT: &'static str = "%Y_%m_%d__%H_%M_%S";

    /// Generate an ID for a run starting now.
    pub fn generate(tag: &str) -> Self {
        Self::at(Local::now(), tag)
    }

    /// Generate an ID for a run starting at `time`.
    pub fn at(time: DateTime<Local>, tag: &str) -> Self {
        Self(format!("{}_{}", time.format(Self::TIMESTAMP_FORMAT), tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One streaming run: its ID, the ordered files and the pacing period.
#[derive(Debug, Clone)]
pub struct StreamSession {
    pub stream_id: StreamId,
    pub records: Vec<FileRecord>,
    pub period: Duration,
}

impl StreamSession {
    pub fn new(stream_id: StreamId, records: Vec<FileRecord>, period: Duration) -> Self {
        Self {
            stream_id,
            records,
            period,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Metadata delivered alongside each image payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub stream_id: StreamId,

    pub time_point_number: u32,

    pub well: String,

    pub imaging_point_number: u32,

    pub color_channel: String,

    pub full_path: PathBuf,

    /// Document timestamp downstream consumers index on (the time point)
    pub timestamp: u32,

    /// Placeholder (latitude, longitude)
    pub location: (f64, f64),

    /// Substream the image belongs to (the well)
    pub substream_id: String,

    /// Payload size in bytes
    pub image_length_bytes: usize,

    pub original_filename: String,

    /// Seconds since the Unix epoch when the message was built
    pub unix_timestamp: f64,
}

/// An image payload ready for a sink.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub payload: Vec<u8>,
    pub file_name: String,
    pub metadata: MessageMetadata,
}

impl OutboundMessage {
    /// Build the message for `record`, stamping it with the current time.
    pub fn new(record: &FileRecord, stream_id: &StreamId, payload: Vec<u8>) -> Self {
        let unix_timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();

        let metadata = MessageMetadata {
            stream_id: stream_id.clone(),
            time_point_number: record.info.time_point_number,
            well: record.info.well.clone(),
            imaging_point_number: record.info.imaging_point_number,
            color_channel: record.info.color_channel.clone(),
            full_path: record.full_path.clone(),
            timestamp: record.info.time_point_number,
            location: PLACEHOLDER_LOCATION,
            substream_id: record.info.well.clone(),
            image_length_bytes: payload.len(),
            original_filename: record.file_name.clone(),
            unix_timestamp,
        };

        Self {
            payload,
            file_name: record.file_name.clone(),
            metadata,
        }
    }

    /// Metadata serialized as compact JSON, for headers.
    pub fn metadata_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.metadata)
    }
}
