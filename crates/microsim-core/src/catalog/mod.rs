//! File catalog: list an image directory, parse names, filter and order.

pub mod naming;

pub use naming::{normalize_channel, AznFilenameParser, FilenameParser};

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

use crate::error::CatalogError;
use crate::types::{FileInfo, FileRecord};

/// Set of color channels a run is restricted to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelFilter {
    channels: BTreeSet<String>,
}

impl ChannelFilter {
    /// Build a filter from channel identifiers ("1", "03", ...).
    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            channels: channels
                .into_iter()
                .map(|c| normalize_channel(c.as_ref()))
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated list such as "1,3".
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// `None` when the list is empty (meaning: keep every channel).
    pub fn from_list(channels: &[String]) -> Option<Self> {
        let filter = Self::new(channels);
        (!filter.is_empty()).then_some(filter)
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains(&normalize_channel(channel))
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(String::as_str)
    }
}

/// Predicate that keeps every file.
pub fn accept_all(_: &FileInfo) -> bool {
    true
}

/// Lists a directory of images and orders them the way a microscope emits them.
#[derive(Clone)]
pub struct FileCatalog {
    parser: Arc<dyn FilenameParser>,
}

impl Default for FileCatalog {
    fn default() -> Self {
        Self::new(Arc::new(AznFilenameParser))
    }
}

impl FileCatalog {
    /// Create a catalog that parses names with `parser`.
    pub fn new(parser: Arc<dyn FilenameParser>) -> Self {
        Self { parser }
    }

    /// Build the ordered set of files to stream.
    ///
    /// Hidden entries and names the parser rejects are dropped silently. Fails
    /// only when the directory itself cannot be listed.
    pub fn build<P>(
        &self,
        directory: &Path,
        channel_filter: Option<&ChannelFilter>,
        predicate: P,
    ) -> Result<Vec<FileRecord>, CatalogError>
    where
        P: Fn(&FileInfo) -> bool,
    {
        let meta = std::fs::metadata(directory).map_err(|source| CatalogError::ListDirectory {
            path: directory.to_path_buf(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(CatalogError::NotADirectory(directory.to_path_buf()));
        }

        let mut records = Vec::new();
        let mut rejected = 0usize;

        for entry in WalkDir::new(directory)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(CatalogError::ListDirectory {
                        path: directory.to_path_buf(),
                        source: e.into(),
                    });
                }
                Err(e) => {
                    tracing::debug!("Skipping unreadable entry: {e}");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str() else {
                continue;
            };
            if file_name.starts_with('.') {
                continue;
            }

            let Some(info) = self.parser.parse(file_name) else {
                tracing::trace!("Name does not follow the convention: {file_name}");
                rejected += 1;
                continue;
            };

            if !predicate(&info) {
                continue;
            }
            if let Some(filter) = channel_filter {
                if !filter.contains(&info.color_channel) {
                    continue;
                }
            }

            records.push(FileRecord {
                file_name: file_name.to_string(),
                info,
                full_path: directory.join(file_name),
            });
        }

        records.sort_by(|a, b| a.stream_order(b));

        tracing::debug!(
            "Catalogued {} file(s) in {:?} ({} unparsable)",
            records.len(),
            directory,
            rejected
        );
        Ok(records)
    }
}
