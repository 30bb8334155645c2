//! End-to-end runs over a generated plate directory.

use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma};
use microsim_core::{
    accept_all, Delivery, DeliveryError, FileCatalog, ImageCodec, MessageMetadata, OutboundMessage,
    StreamController, StreamEvent, StreamOptions, StreamOutcome, StreamSink,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Sink that keeps every message it receives.
#[derive(Clone, Default)]
struct CapturingSink {
    messages: Arc<Mutex<Vec<OutboundMessage>>>,
}

#[async_trait]
impl StreamSink for CapturingSink {
    fn name(&self) -> &str {
        "capture"
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}

const PLATE: [&str; 3] = [
    "assay_D04_T0002F001L01A01Z01C01.png",
    "assay_B02_T0001F002L01A01Z01C01.png",
    "assay_B02_T0001F001L01A01Z01C02.png",
];

const EXPECTED_ORDER: [&str; 3] = [
    "assay_B02_T0001F001L01A01Z01C02.png",
    "assay_B02_T0001F002L01A01Z01C01.png",
    "assay_D04_T0002F001L01A01Z01C01.png",
];

fn write_png(path: &Path, width: u32, height: u32) {
    let buf = ImageBuffer::from_fn(width, height, |x, y| Luma([(x * 10 + y) as u16]));
    DynamicImage::ImageLuma16(buf)
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
}

/// Three valid images plus one file whose name does not parse.
fn plate() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in PLATE {
        write_png(&dir.path().join(name), 8, 6);
    }
    std::fs::write(dir.path().join("notes.txt"), b"calibration run").unwrap();
    dir
}

fn controller(sink: &CapturingSink) -> StreamController {
    StreamController::new(
        FileCatalog::default(),
        ImageCodec::default(),
        Some(Box::new(sink.clone())),
    )
}

fn names(messages: &[OutboundMessage]) -> Vec<String> {
    messages.iter().map(|m| m.file_name.clone()).collect()
}

#[tokio::test]
async fn test_stream_sends_each_valid_file_once_in_order() {
    let dir = plate();
    let sink = CapturingSink::default();

    let report = controller(&sink)
        .run(dir.path(), &StreamOptions::default(), accept_all)
        .await
        .unwrap();

    assert_eq!(report.outcome, StreamOutcome::Completed);
    assert_eq!(report.stats.total, 3);
    assert_eq!(report.stats.sent, 3);

    let messages = sink.messages.lock().unwrap();
    assert_eq!(names(&messages), EXPECTED_ORDER);

    for message in messages.iter() {
        let on_disk = std::fs::read(dir.path().join(&message.file_name)).unwrap();
        assert_eq!(message.payload, on_disk);
        assert_eq!(message.metadata.stream_id, report.stream_id);
        assert_eq!(message.metadata.image_length_bytes, on_disk.len());
        assert_eq!(message.metadata.substream_id, message.metadata.well);
        assert_eq!(
            message.metadata.timestamp,
            message.metadata.time_point_number
        );
    }
    assert_eq!(messages[0].metadata.color_channel, "2");
}

#[tokio::test]
async fn test_binned_stream_sends_smaller_tiffs() {
    let dir = plate();
    let sink = CapturingSink::default();
    let options = StreamOptions {
        binning: Some(2),
        ..StreamOptions::default()
    };

    let report = controller(&sink)
        .run(dir.path(), &options, accept_all)
        .await
        .unwrap();
    assert_eq!(report.stats.sent, 3);

    for message in sink.messages.lock().unwrap().iter() {
        let img = image::load_from_memory_with_format(&message.payload, ImageFormat::Tiff).unwrap();
        assert_eq!((img.width(), img.height()), (4, 3));
        assert_eq!(message.metadata.image_length_bytes, message.payload.len());
    }
}

#[tokio::test]
async fn test_dry_run_reports_every_file() {
    let dir = plate();
    let mut controller =
        StreamController::new(FileCatalog::default(), ImageCodec::default(), None);

    let mut dry = Vec::new();
    let report = controller
        .run_with_events(dir.path(), &StreamOptions::default(), accept_all, |event| {
            if let StreamEvent::FileStreamed {
                metadata,
                delivery: Delivery::Dry,
                ..
            } = event
            {
                dry.push(metadata.original_filename);
            }
        })
        .await
        .unwrap();

    assert_eq!(report.stats.dry, 3);
    assert_eq!(dry, EXPECTED_ORDER);
}

#[tokio::test]
async fn test_two_runs_differ_only_in_stream_identity() {
    let dir = plate();

    let first = CapturingSink::default();
    let report_a = controller(&first)
        .run(dir.path(), &StreamOptions::default(), accept_all)
        .await
        .unwrap();

    // Stream IDs have one-second resolution.
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let second = CapturingSink::default();
    let report_b = controller(&second)
        .run(dir.path(), &StreamOptions::default(), accept_all)
        .await
        .unwrap();

    assert_ne!(report_a.stream_id, report_b.stream_id);

    let a = first.messages.lock().unwrap();
    let b = second.messages.lock().unwrap();
    assert_eq!(names(&a), names(&b));

    let normalize = |m: &OutboundMessage| MessageMetadata {
        stream_id: report_a.stream_id.clone(),
        unix_timestamp: 0.0,
        ..m.metadata.clone()
    };
    for (x, y) in a.iter().zip(b.iter()) {
        assert_eq!(normalize(x), normalize(y));
        assert_eq!(x.payload, y.payload);
    }
}

#[tokio::test]
async fn test_empty_directory_completes_with_nothing_sent() {
    let dir = tempfile::tempdir().unwrap();
    let sink = CapturingSink::default();

    let report = controller(&sink)
        .run(dir.path(), &StreamOptions::default(), accept_all)
        .await
        .unwrap();

    assert_eq!(report.outcome, StreamOutcome::Completed);
    assert_eq!(report.stats.total, 0);
    assert!(sink.messages.lock().unwrap().is_empty());
}
