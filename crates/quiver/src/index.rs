#![forbid(unsafe_code)]

//! Remote index parsing.
//!
//! The origin exposes a line-oriented text resource next to the bundles:
//! one `name,version,checksum` triple per line, with unknown trailing fields
//! ignored. Malformed lines are skipped with a warning; the remaining lines
//! still apply.

use tracing::warn;

/// One row of the remote index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    pub version: u64,
    pub checksum: u32,
}

/// Parse the remote index text into entries, skipping malformed lines.
pub fn parse_index(text: &str) -> Vec<IndexEntry> {
    text.lines()
        .enumerate()
        .filter_map(|(lineno, raw)| {
            let line = raw.trim();
            if line.is_empty() {
                return None;
            }

            let mut fields = line.split(',');
            let name = fields.next().map(str::trim).unwrap_or_default();
            let version = fields.next().and_then(|f| f.trim().parse::<u64>().ok());
            let checksum = fields.next().and_then(|f| f.trim().parse::<u32>().ok());

            match (version, checksum) {
                (Some(version), Some(checksum)) if !name.is_empty() => Some(IndexEntry {
                    name: name.to_string(),
                    version,
                    checksum,
                }),
                _ => {
                    warn!(lineno, line = raw, "skipping malformed index line");
                    None
                }
            }
        })
        .collect()
}
