//! GFF line parsing

use annotarium_core::{AnnotariumError, AnnotariumResult};
use std::collections::BTreeMap;

/// One parsed GFF data line.
///
/// Coordinates are 1-based inclusive as in the file. The attribute column is
/// exploded into a map; duplicate keys keep the first value seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GffRecord {
    pub seqid: String,
    pub source: String,
    pub feature_type: String,
    pub start: u64,
    pub end: u64,
    pub attributes: BTreeMap<String, String>,
}

impl GffRecord {
    /// Parse a data line. Returns `Ok(None)` for header lines and rows with
    /// fewer than nine columns, which callers skip rather than fail on.
    pub fn parse(line: &str) -> AnnotariumResult<Option<GffRecord>> {
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 9 {
            return Ok(None);
        }

        let start: u64 = cols[3]
            .parse()
            .map_err(|_| AnnotariumError::Parse(format!("invalid start coordinate: {}", cols[3])))?;
        let end: u64 = cols[4]
            .parse()
            .map_err(|_| AnnotariumError::Parse(format!("invalid end coordinate: {}", cols[4])))?;

        Ok(Some(GffRecord {
            seqid: cols[0].trim().to_string(),
            source: cols[1].trim().to_string(),
            feature_type: cols[2].trim().to_string(),
            start,
            end,
            attributes: parse_attributes(cols[8]),
        }))
    }

    /// Inclusive feature length.
    pub fn length(&self) -> u64 {
        if self.end >= self.start {
            self.end - self.start + 1
        } else {
            0
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.attributes.get("ID").map(String::as_str)
    }

    /// All `Parent` identifiers; the attribute value is comma-separated.
    pub fn parents(&self) -> Vec<&str> {
        self.attributes
            .get("Parent")
            .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }
}

/// Split the ninth column on `;`, then each part on the first `=`.
pub fn parse_attributes(raw: &str) -> BTreeMap<String, String> {
    let mut attrs = BTreeMap::new();
    for part in raw.split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((key, value)) = part.split_once('=') {
            attrs
                .entry(key.trim().to_string())
                .or_insert_with(|| value.trim().to_string());
        }
    }
    attrs
}
