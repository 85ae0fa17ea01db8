//! Indexed reads over bgzipped GFF artifacts

use annotarium_core::{AnnotariumError, AnnotariumResult};
use noodles::bgzf;
use noodles::core::region::Interval;
use noodles::core::Position;
use noodles::csi::{
    self as csi, binning_index::index::reference_sequence::bin::Chunk, BinningIndex,
};
use std::collections::VecDeque;
use std::fs::File;
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// A bgzipped GFF plus its CSI index, opened for querying.
pub struct IndexedGff {
    bgz_path: PathBuf,
    index: csi::Index,
}

impl IndexedGff {
    pub fn open(bgz_path: &Path, csi_path: &Path) -> AnnotariumResult<Self> {
        let index = csi::fs::read(csi_path)
            .map_err(|e| AnnotariumError::Parse(format!("cannot read index: {e}")))?;
        Ok(Self {
            bgz_path: bgz_path.to_path_buf(),
            index,
        })
    }

    /// Distinct seqids recorded in the index header.
    pub fn contig_names(&self) -> Vec<String> {
        self.index
            .header()
            .map(|h| h.reference_sequence_names().iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_contig(&self, name: &str) -> bool {
        self.reference_sequence_id(name).is_some()
    }

    fn reference_sequence_id(&self, name: &str) -> Option<usize> {
        self.index
            .header()
            .and_then(|h| h.reference_sequence_names().get_index_of(name))
    }

    /// Stream data lines of `seqid` overlapping the optional 1-based
    /// inclusive interval, in block-index order.
    pub fn query(
        &self,
        seqid: &str,
        start: Option<u64>,
        end: Option<u64>,
    ) -> AnnotariumResult<RegionLines> {
        let reference_sequence_id = self
            .reference_sequence_id(seqid)
            .ok_or_else(|| AnnotariumError::NotFound(format!("region not found: {seqid}")))?;

        let start_pos = start.map(to_position).transpose()?;
        let end_pos = end.map(to_position).transpose()?;
        let interval: Interval = match (start_pos, end_pos) {
            (Some(s), Some(e)) => (s..=e).into(),
            (Some(s), None) => (s..).into(),
            (None, Some(e)) => (..=e).into(),
            (None, None) => (..).into(),
        };

        let chunks = self
            .index
            .query(reference_sequence_id, interval)
            .map_err(|e| AnnotariumError::Parse(format!("index query failed: {e}")))?;

        let reader = bgzf::Reader::new(File::open(&self.bgz_path)?);
        Ok(RegionLines {
            reader,
            chunks: chunks.into(),
            current_chunk_end: None,
            seqid: seqid.to_string(),
            query_start: start.unwrap_or(1),
            query_end: end.unwrap_or(u64::MAX),
            done: false,
        })
    }

    /// Stream every data line of the file in order.
    pub fn scan(&self) -> AnnotariumResult<FileLines> {
        let reader = bgzf::Reader::new(File::open(&self.bgz_path)?);
        Ok(FileLines { reader, done: false })
    }
}

fn to_position(value: u64) -> AnnotariumResult<Position> {
    Position::try_from(value as usize)
        .map_err(|_| AnnotariumError::InvalidInput(format!("positions are 1-based: {value}")))
}

/// Iterator over the data lines of one indexed region.
pub struct RegionLines {
    reader: bgzf::Reader<File>,
    chunks: VecDeque<Chunk>,
    current_chunk_end: Option<bgzf::VirtualPosition>,
    seqid: String,
    query_start: u64,
    query_end: u64,
    done: bool,
}

impl RegionLines {
    fn read_next(&mut self) -> AnnotariumResult<Option<String>> {
        loop {
            if self.done {
                return Ok(None);
            }

            match self.current_chunk_end {
                Some(end) if self.reader.virtual_position() < end => {}
                _ => {
                    let Some(chunk) = self.chunks.pop_front() else {
                        self.done = true;
                        return Ok(None);
                    };
                    self.reader
                        .seek(chunk.start())
                        .map_err(AnnotariumError::Io)?;
                    self.current_chunk_end = Some(chunk.end());
                }
            }

            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                self.done = true;
                return Ok(None);
            }
            let line = line.trim_end_matches('\n');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (seqid, start, end) = line_coordinates(line)?;
            if seqid != self.seqid {
                // Block boundaries can bleed into neighboring contigs; the
                // stream is seqid-sorted so anything past ours ends the scan.
                if seqid > self.seqid.as_str() {
                    self.done = true;
                    return Ok(None);
                }
                continue;
            }
            if start > self.query_end {
                self.done = true;
                return Ok(None);
            }
            if end < self.query_start {
                continue;
            }
            return Ok(Some(line.to_string()));
        }
    }
}

impl Iterator for RegionLines {
    type Item = AnnotariumResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next().transpose()
    }
}

fn line_coordinates(line: &str) -> AnnotariumResult<(&str, u64, u64)> {
    let mut cols = line.split('\t');
    let seqid = cols
        .next()
        .ok_or_else(|| AnnotariumError::Parse("empty GFF line".to_string()))?;
    let start = cols
        .nth(2)
        .and_then(|c| c.parse().ok())
        .ok_or_else(|| AnnotariumError::Parse(format!("invalid start column: {line}")))?;
    let end = cols
        .next()
        .and_then(|c| c.parse().ok())
        .ok_or_else(|| AnnotariumError::Parse(format!("invalid end column: {line}")))?;
    Ok((seqid, start, end))
}

/// Iterator over every data line of a bgzipped GFF.
pub struct FileLines {
    reader: bgzf::Reader<File>,
    done: bool,
}

impl Iterator for FileLines {
    type Item = AnnotariumResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {
                    let line = line.trim_end_matches('\n');
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    return Some(Ok(line.to_string()));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gff::bgzip::compress_and_index;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, IndexedGff) {
        let dir = TempDir::new().unwrap();
        let sorted = dir.path().join("sorted.gff");
        let bgz = dir.path().join("a.gff.gz");
        let csi = dir.path().join("a.gff.gz.csi");

        let mut content = String::from("##gff-version 3\n");
        for i in 1..=50u64 {
            content.push_str(&format!(
                "1\tsrc\texon\t{}\t{}\t.\t+\t.\tID=e{i}\n",
                i * 1000,
                i * 1000 + 100
            ));
        }
        content.push_str("2\tsrc\tgene\t500\t900\t.\t+\t.\tID=g1\n");
        std::fs::write(&sorted, &content).unwrap();
        compress_and_index(&sorted, &bgz, &csi).unwrap();

        let indexed = IndexedGff::open(&bgz, &csi).unwrap();
        (dir, indexed)
    }

    #[test]
    fn test_contig_names() {
        let (_dir, indexed) = fixture();
        assert_eq!(indexed.contig_names(), vec!["1".to_string(), "2".to_string()]);
        assert!(indexed.has_contig("2"));
        assert!(!indexed.has_contig("MT"));
    }

    #[test]
    fn test_query_interval() {
        let (_dir, indexed) = fixture();
        let lines: Vec<String> = indexed
            .query("1", Some(5000), Some(7000))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        // features at 5000, 6000, 7000 overlap [5000, 7000]
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("ID=e5"));
        assert!(lines[2].contains("ID=e7"));
    }

    #[test]
    fn test_query_whole_contig() {
        let (_dir, indexed) = fixture();
        let lines: Vec<String> = indexed
            .query("2", None, None)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("ID=g1"));
    }

    #[test]
    fn test_query_unknown_region() {
        let (_dir, indexed) = fixture();
        assert!(matches!(
            indexed.query("MT", None, None),
            Err(AnnotariumError::NotFound(_))
        ));
    }

    #[test]
    fn test_scan_skips_headers() {
        let (_dir, indexed) = fixture();
        let lines: Vec<String> = indexed.scan().unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(lines.len(), 51);
        assert!(lines.iter().all(|l| !l.starts_with('#')));
    }
}
