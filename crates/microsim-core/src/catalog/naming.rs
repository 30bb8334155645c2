//! Filename conventions that turn an image file name into `FileInfo`.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::FileInfo;

/// Parses image file names into structured fields.
///
/// Returning `None` means the name does not follow the convention; the
/// catalog drops such files without reporting an error.
pub trait FilenameParser: Send + Sync {
    fn parse(&self, file_name: &str) -> Option<FileInfo>;
}

impl<F> FilenameParser for F
where
    F: Fn(&str) -> Option<FileInfo> + Send + Sync,
{
    fn parse(&self, file_name: &str) -> Option<FileInfo> {
        self(file_name)
    }
}

// e.g. AssayPlate_Greiner_#655090_D02_T0001F006L01A02Z01C02.tif
static AZN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<plate>.+)_(?P<well>[A-Z][0-9]{2})_T(?P<t>[0-9]{4})F(?P<f>[0-9]{3})L(?P<l>[0-9]{2})A(?P<a>[0-9]{2})Z(?P<z>[0-9]{2})C(?P<c>[0-9]{2})\.(?P<ext>(?i:tiff?|png))$",
    )
    .expect("AZN filename pattern is valid")
});

/// The Yokogawa / AZ naming convention used by high-content screening plates.
#[derive(Debug, Clone, Copy, Default)]
pub struct AznFilenameParser;

impl FilenameParser for AznFilenameParser {
    fn parse(&self, file_name: &str) -> Option<FileInfo> {
        let caps = AZN_PATTERN.captures(file_name)?;
        let number = |name: &str| caps.name(name)?.as_str().parse::<u32>().ok();

        Some(FileInfo {
            time_point_number: number("t")?,
            well: caps["well"].to_string(),
            imaging_point_number: number("f")?,
            color_channel: normalize_channel(&caps["c"]),
            plate: Some(caps["plate"].to_string()),
            time_line_number: number("l"),
            action_list_number: number("a"),
            z_index: number("z"),
            extension: Some(caps["ext"].to_string()),
        })
    }
}

/// Strip zero padding from a channel identifier: "02" -> "2", "0" -> "0".
pub fn normalize_channel(channel: &str) -> String {
    let trimmed = channel.trim().trim_start_matches('0');
    if trimmed.is_empty() && !channel.trim().is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
