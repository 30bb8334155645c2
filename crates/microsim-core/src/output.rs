//! JSON / JSONL output for catalog listings and stream manifests.
//!
//! A manifest has one [`ManifestEntry`] per catalogued file, so a run can
//! be audited or replayed against what the consumer received.

use serde::Serialize;
use std::io::{self, Write};

use crate::controller::{Delivery, StreamEvent};
use crate::types::MessageMetadata;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printable JSON value or array
    Json,
    /// One compact JSON object per line
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// Outcome recorded for one file in a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Sent,
    Dry,
    Failed,
    Skipped,
}

/// One manifest line.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub index: usize,
    pub file_name: String,
    pub status: EntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl ManifestEntry {
    /// Entry for a per-file event; `None` for lifecycle events.
    pub fn from_event(event: &StreamEvent) -> Option<Self> {
        match event {
            StreamEvent::FileStreamed {
                index,
                metadata,
                delivery,
                ..
            } => {
                let (status, error) = match delivery {
                    Delivery::Sent => (EntryStatus::Sent, None),
                    Delivery::Dry => (EntryStatus::Dry, None),
                    Delivery::Failed(e) => (EntryStatus::Failed, Some(e.clone())),
                };
                Some(Self {
                    index: *index,
                    file_name: metadata.original_filename.clone(),
                    status,
                    error,
                    metadata: Some(metadata.as_ref().clone()),
                })
            }
            StreamEvent::FileSkipped {
                index,
                file_name,
                error,
                ..
            } => Some(Self {
                index: *index,
                file_name: file_name.clone(),
                status: EntryStatus::Skipped,
                error: Some(error.clone()),
                metadata: None,
            }),
            StreamEvent::StateChanged(_) | StreamEvent::Cataloged { .. } => None,
        }
    }
}

/// Serializes items to JSON or JSONL.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    items_written: usize,
}

impl<W: Write> OutputWriter<W> {
    /// `pretty` only affects [`OutputFormat::Json`].
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            items_written: 0,
        }
    }

    /// Write a single item followed by a newline.
    pub fn write<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        if self.pretty && self.format == OutputFormat::Json {
            serde_json::to_writer_pretty(&mut self.writer, item).map_err(io::Error::other)?;
        } else {
            serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
        }
        writeln!(self.writer)?;
        self.items_written += 1;
        Ok(())
    }

    /// Write a batch: one array for JSON, one line per item for JSONL.
    pub fn write_all<T: Serialize>(&mut self, items: &[T]) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                if self.pretty {
                    serde_json::to_writer_pretty(&mut self.writer, items)
                        .map_err(io::Error::other)?;
                } else {
                    serde_json::to_writer(&mut self.writer, items).map_err(io::Error::other)?;
                }
                writeln!(self.writer)?;
                self.items_written += items.len();
            }
            OutputFormat::JsonLines => {
                for item in items {
                    self.write(item)?;
                }
            }
        }
        Ok(())
    }

    pub fn items_written(&self) -> usize {
        self.items_written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::StreamState;
    use crate::types::{FileInfo, FileRecord, OutboundMessage, StreamId};
    use std::path::PathBuf;

    fn streamed(delivery: Delivery) -> StreamEvent {
        let record = FileRecord {
            file_name: "plate_C03_T0002F004L01A01Z01C02.tif".to_string(),
            info: FileInfo::new(2, "C03", 4, "2"),
            full_path: PathBuf::from("/plates/plate_C03_T0002F004L01A01Z01C02.tif"),
        };
        let message = OutboundMessage::new(&record, &StreamId::generate("ll"), vec![0; 10]);
        StreamEvent::FileStreamed {
            index: 5,
            total: 9,
            metadata: Box::new(message.metadata),
            delivery,
        }
    }

    #[test]
    fn test_entry_from_sent_event() {
        let entry = ManifestEntry::from_event(&streamed(Delivery::Sent)).unwrap();
        assert_eq!(entry.index, 5);
        assert_eq!(entry.status, EntryStatus::Sent);
        assert!(entry.error.is_none());
        assert_eq!(entry.metadata.unwrap().substream_id, "C03");
    }

    #[test]
    fn test_entry_from_failed_and_skipped() {
        let failed =
            ManifestEntry::from_event(&streamed(Delivery::Failed("HTTP 413".into()))).unwrap();
        assert_eq!(failed.status, EntryStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("HTTP 413"));

        let skipped = ManifestEntry::from_event(&StreamEvent::FileSkipped {
            index: 1,
            total: 2,
            file_name: "broken.tif".into(),
            error: "decode failed".into(),
        })
        .unwrap();
        assert_eq!(skipped.status, EntryStatus::Skipped);
        assert!(skipped.metadata.is_none());
    }

    #[test]
    fn test_lifecycle_events_have_no_entry() {
        assert!(
            ManifestEntry::from_event(&StreamEvent::StateChanged(StreamState::Streaming)).is_none()
        );
    }

    #[test]
    fn test_jsonl_manifest_one_line_per_entry() {
        let mut buffer = Vec::new();
        let mut writer = OutputWriter::new(&mut buffer, OutputFormat::JsonLines, true);
        for delivery in [Delivery::Sent, Delivery::Dry] {
            let entry = ManifestEntry::from_event(&streamed(delivery)).unwrap();
            writer.write(&entry).unwrap();
        }
        assert_eq!(writer.items_written(), 2);

        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["status"], "sent");
        assert!(first.get("error").is_none());
    }

    #[test]
    fn test_write_all_json_array() {
        let mut buffer = Vec::new();
        let mut writer = OutputWriter::new(&mut buffer, OutputFormat::Json, false);
        writer.write_all(&["a", "b"]).unwrap();
        assert_eq!(writer.items_written(), 2);

        let output = String::from_utf8(buffer).unwrap();
        assert_eq!(output.trim(), r#"["a","b"]"#);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("NDJSON"), Some(OutputFormat::JsonLines));
        assert_eq!(OutputFormat::parse("yaml"), None);
    }
}
