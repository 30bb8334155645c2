//! Command implementations.

pub mod config;
pub mod list;
pub mod stream;

use microsim_core::ChannelFilter;
use std::collections::BTreeSet;

/// Parse a `--channels` list; `None` when it names no channel (keep all).
pub fn parse_channels(list: &str) -> Option<ChannelFilter> {
    let filter = ChannelFilter::parse(list);
    (!filter.is_empty()).then_some(filter)
}

/// Parse a comma-separated well list (`B02,c03`) into upper-case well IDs.
///
/// Returns `None` when the list names no wells.
pub fn parse_wells(list: &str) -> Option<BTreeSet<String>> {
    let wells: BTreeSet<String> = list
        .split(',')
        .map(|w| w.trim().to_ascii_uppercase())
        .filter(|w| !w.is_empty())
        .collect();
    (!wells.is_empty()).then_some(wells)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wells() {
        let wells = parse_wells(" b02, C03 ,,").unwrap();
        assert_eq!(wells.len(), 2);
        assert!(wells.contains("B02"));
        assert!(wells.contains("C03"));
        assert!(parse_wells(" , ").is_none());
    }

    #[test]
    fn test_empty_channel_list_keeps_every_channel() {
        assert!(parse_channels(",").is_none());
        assert!(parse_channels("").is_none());
        let filter = parse_channels("01,3").unwrap();
        assert!(filter.contains("1"));
        assert!(filter.contains("03"));
    }
}
