//! The `microsim stream` command.

mod progress;
mod setup;

use clap::{Args, ValueEnum};
use microsim_core::{
    Config, FileInfo, ManifestEntry, OutputFormat, OutputWriter, SinkKind, StreamController,
    StreamEvent, StreamOutcome,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use progress::{create_progress_bar, print_summary};
use setup::{apply_overrides, well_filter};

/// Sink selection on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkArg {
    /// Prepare images but send nothing
    None,
    /// Kafka topic
    Queue,
    /// HTTP endpoint
    Http,
}

impl From<SinkArg> for SinkKind {
    fn from(arg: SinkArg) -> Self {
        match arg {
            SinkArg::None => SinkKind::None,
            SinkArg::Queue => SinkKind::Queue,
            SinkArg::Http => SinkKind::Http,
        }
    }
}

/// Arguments for the `stream` command.
#[derive(Args, Debug, Default)]
pub struct StreamArgs {
    /// Directory of microscope images
    #[arg(required = true)]
    pub dir: PathBuf,

    /// Seconds to wait after each image
    #[arg(short, long, value_parser = parse_period)]
    pub period: Option<f64>,

    /// Bin images N×N before sending
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    pub binning: Option<u32>,

    /// Only send these color channels (comma-separated, e.g. "1,3")
    #[arg(long)]
    pub channels: Option<String>,

    /// Only send these wells (comma-separated, e.g. "B02,C03")
    #[arg(long)]
    pub wells: Option<String>,

    /// Where to deliver images
    #[arg(short, long, value_enum)]
    pub sink: Option<SinkArg>,

    /// Prepare images without sending (same as --sink none)
    #[arg(long, conflicts_with = "sink")]
    pub dry_run: bool,

    /// Tag appended to the stream ID
    #[arg(long)]
    pub tag: Option<String>,

    /// Kafka bootstrap servers
    #[arg(long, env = "MICROSIM_BOOTSTRAP_SERVERS")]
    pub bootstrap_servers: Option<String>,

    /// Kafka topic
    #[arg(long)]
    pub topic: Option<String>,

    /// HTTP ingest endpoint
    #[arg(long, env = "MICROSIM_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Retries after a transient delivery fault
    #[arg(long)]
    pub retries: Option<u32>,

    /// Write one JSON line per file to this path
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

fn parse_period(s: &str) -> Result<f64, String> {
    let secs: f64 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if secs.is_finite() && secs >= 0.0 {
        Ok(secs)
    } else {
        Err("period must be a non-negative number of seconds".to_string())
    }
}

/// Execute the stream command.
pub async fn execute(args: StreamArgs, mut config: Config) -> anyhow::Result<()> {
    if !args.dir.is_dir() {
        anyhow::bail!(
            "Not a directory: {:?}\n\n  Hint: pass the folder that holds the plate images.",
            args.dir
        );
    }

    let options = apply_overrides(&args, &mut config)?;
    let wells = well_filter(&args);

    let token = CancellationToken::new();
    let mut controller = StreamController::from_config(&config)
        .await?
        .with_cancellation(token.clone());

    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted: stopping after the current image");
            ctrl_c.cancel();
        }
    });

    let mut manifest = match &args.manifest {
        Some(path) => Some(OutputWriter::new(
            BufWriter::new(File::create(path)?),
            OutputFormat::JsonLines,
            false,
        )),
        None => None,
    };
    let mut manifest_error = None;

    let progress = create_progress_bar(args.no_progress)?;

    let report = controller
        .run_with_events(
            &args.dir,
            &options,
            |info: &FileInfo| wells.as_ref().map_or(true, |w| w.contains(&info.well)),
            |event| {
                match &event {
                    StreamEvent::Cataloged { stream_id, total } => {
                        progress.set_length(*total as u64);
                        progress.set_message(stream_id.to_string());
                    }
                    StreamEvent::FileStreamed { metadata, .. } => {
                        progress.set_message(metadata.original_filename.clone());
                        progress.inc(1);
                    }
                    StreamEvent::FileSkipped { file_name, .. } => {
                        progress.set_message(format!("skipped {file_name}"));
                        progress.inc(1);
                    }
                    StreamEvent::StateChanged(_) => {}
                }

                if let (Some(writer), Some(entry)) =
                    (manifest.as_mut(), ManifestEntry::from_event(&event))
                {
                    if let Err(e) = writer.write(&entry) {
                        manifest_error.get_or_insert(e);
                    }
                }
            },
        )
        .await?;

    progress.finish_and_clear();

    if let Some(writer) = manifest.as_mut() {
        writer.flush()?;
    }
    if let Some(e) = manifest_error {
        tracing::error!("Manifest is incomplete: {e}");
    }

    print_summary(&report, controller.is_dry_run());

    match report.outcome {
        StreamOutcome::Completed => {
            println!("{}", report.stream_id);
            Ok(())
        }
        StreamOutcome::Cancelled => {
            anyhow::bail!("stream {} cancelled before completion", report.stream_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: StreamArgs,
    }

    fn parse(argv: &[&str]) -> Result<StreamArgs, clap::Error> {
        let mut full = vec!["stream"];
        full.extend_from_slice(argv);
        TestCli::try_parse_from(full).map(|cli| cli.args)
    }

    #[test]
    fn test_defaults_leave_config_in_charge() {
        let args = parse(&["./plate"]).unwrap();
        assert_eq!(args.dir, PathBuf::from("./plate"));
        assert!(args.period.is_none());
        assert!(args.binning.is_none());
        assert!(args.sink.is_none());
        assert!(!args.dry_run);
        assert!(args.manifest.is_none());
    }

    #[test]
    fn test_binning_must_be_positive() {
        assert!(parse(&["./plate", "--binning", "0"]).is_err());
        assert_eq!(parse(&["./plate", "-b", "4"]).unwrap().binning, Some(4));
    }

    #[test]
    fn test_period_rejects_negative() {
        assert!(parse(&["./plate", "--period", "-1"]).is_err());
        assert!(parse(&["./plate", "--period", "abc"]).is_err());
        assert_eq!(parse(&["./plate", "-p", "0.5"]).unwrap().period, Some(0.5));
    }

    #[test]
    fn test_dry_run_conflicts_with_sink() {
        assert!(parse(&["./plate", "--dry-run", "--sink", "http"]).is_err());
        let args = parse(&["./plate", "--sink", "queue"]).unwrap();
        assert_eq!(args.sink, Some(SinkArg::Queue));
    }
}
