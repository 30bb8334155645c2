//! The `microsim list` command: print the catalog in send order.

use clap::{Args, ValueEnum};
use microsim_core::{ChannelFilter, Config, FileCatalog, FileInfo, OutputFormat, OutputWriter};
use std::io::BufWriter;
use std::path::PathBuf;

use super::{parse_channels, parse_wells};

/// Output format for `list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    /// Pretty JSON array
    Json,
    /// One record per line
    Jsonl,
}

impl From<ListFormat> for OutputFormat {
    fn from(format: ListFormat) -> Self {
        match format {
            ListFormat::Json => OutputFormat::Json,
            ListFormat::Jsonl => OutputFormat::JsonLines,
        }
    }
}

/// Arguments for the `list` command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Directory of microscope images
    pub dir: PathBuf,

    /// Only list these color channels (comma-separated, e.g. "1,3")
    #[arg(long)]
    pub channels: Option<String>,

    /// Only list these wells (comma-separated, e.g. "B02,C03")
    #[arg(long)]
    pub wells: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: ListFormat,
}

/// Execute the list command.
pub fn execute(args: ListArgs, config: &Config) -> anyhow::Result<()> {
    let channel_filter = match &args.channels {
        Some(list) => parse_channels(list),
        None => ChannelFilter::from_list(&config.stream.color_channels),
    };
    let wells = args.wells.as_deref().and_then(parse_wells);

    let records = FileCatalog::default().build(
        &args.dir,
        channel_filter.as_ref(),
        |info: &FileInfo| wells.as_ref().map_or(true, |w| w.contains(&info.well)),
    )?;
    tracing::info!("{} file(s) in {:?}", records.len(), args.dir);

    let stdout = std::io::stdout();
    let mut writer = OutputWriter::new(BufWriter::new(stdout.lock()), args.format.into(), true);
    writer.write_all(&records)?;
    writer.flush()?;
    Ok(())
}
