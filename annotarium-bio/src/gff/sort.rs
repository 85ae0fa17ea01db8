//! Streaming coordinate sort for GFF files
//!
//! Header lines (`#`-prefixed) are preserved in order at the top of the
//! output; data lines are stable-sorted by (seqid lexicographic, start
//! integer). Sorting is external: bounded runs are sorted in memory, spilled
//! to scratch files, and k-way merged, so arbitrarily large inputs never
//! load fully into memory. The sorted bytes are MD5-fingerprinted in the
//! same pass that writes them.

use annotarium_core::{AnnotariumError, AnnotariumResult, Md5Digest};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lines held in memory before a run is spilled to disk.
pub const DEFAULT_RUN_CAPACITY: usize = 250_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOutcome {
    /// MD5 over the complete sorted output bytes
    pub digest: Md5Digest,
    pub header_lines: u64,
    pub data_lines: u64,
}

struct SortKey {
    seqid: String,
    start: u64,
}

fn sort_key(line: &str) -> AnnotariumResult<SortKey> {
    let mut cols = line.split('\t');
    let seqid = cols
        .next()
        .ok_or_else(|| AnnotariumError::Parse("empty GFF line".to_string()))?;
    let start_col = cols
        .nth(2)
        .ok_or_else(|| AnnotariumError::Parse(format!("GFF line has no start column: {line}")))?;
    let start: u64 = start_col
        .parse()
        .map_err(|_| AnnotariumError::Parse(format!("invalid start coordinate: {start_col}")))?;
    Ok(SortKey {
        seqid: seqid.to_string(),
        start,
    })
}

/// Heap entry for the k-way merge. Runs are written in input order and each
/// run is internally stable, so tie-breaking on (run, ordinal) preserves the
/// original relative order of equal keys.
struct MergeEntry {
    seqid: String,
    start: u64,
    run: usize,
    ordinal: u64,
    line: String,
}

impl PartialEq for MergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for MergeEntry {}

impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the smallest key pops first.
        (&other.seqid, other.start, other.run, other.ordinal).cmp(&(
            &self.seqid,
            self.start,
            self.run,
            self.ordinal,
        ))
    }
}

/// `Write` adapter that feeds an MD5 context alongside the inner writer.
struct Md5Writer<W: Write> {
    inner: W,
    context: md5::Context,
}

impl<W: Write> Md5Writer<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            context: md5::Context::new(),
        }
    }

    fn finish(mut self) -> std::io::Result<Md5Digest> {
        self.inner.flush()?;
        Ok(Md5Digest::from(self.context.compute()))
    }
}

impl<W: Write> Write for Md5Writer<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.context.consume(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Sort `input` into `output`, spilling runs into `scratch_dir`.
pub fn sort_gff(
    input: &Path,
    output: &Path,
    scratch_dir: &Path,
    run_capacity: usize,
) -> AnnotariumResult<SortOutcome> {
    let reader = BufReader::new(File::open(input)?);
    let mut writer = Md5Writer::new(BufWriter::new(File::create(output)?));

    let mut header_lines = 0u64;
    let mut data_lines = 0u64;
    let mut run_paths: Vec<PathBuf> = Vec::new();
    let mut run: Vec<(SortKey, String)> = Vec::with_capacity(run_capacity.min(1 << 16));

    // Headers go straight to the output; data lines accumulate into runs.
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        if line.starts_with('#') {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
            header_lines += 1;
            continue;
        }
        let key = sort_key(&line)?;
        run.push((key, line));
        data_lines += 1;
        if run.len() >= run_capacity {
            run_paths.push(spill_run(scratch_dir, run_paths.len(), &mut run)?);
        }
    }

    if run_paths.is_empty() {
        // Everything fit in one in-memory run.
        run.sort_by(|a, b| (&a.0.seqid, a.0.start).cmp(&(&b.0.seqid, b.0.start)));
        for (_, line) in &run {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
    } else {
        if !run.is_empty() {
            run_paths.push(spill_run(scratch_dir, run_paths.len(), &mut run)?);
        }
        debug!(runs = run_paths.len(), data_lines, "merging sorted runs");
        merge_runs(&run_paths, &mut writer)?;
        for path in &run_paths {
            let _ = std::fs::remove_file(path);
        }
    }

    let digest = writer.finish()?;
    Ok(SortOutcome {
        digest,
        header_lines,
        data_lines,
    })
}

fn spill_run(
    scratch_dir: &Path,
    index: usize,
    run: &mut Vec<(SortKey, String)>,
) -> AnnotariumResult<PathBuf> {
    run.sort_by(|a, b| (&a.0.seqid, a.0.start).cmp(&(&b.0.seqid, b.0.start)));
    let path = scratch_dir.join(format!("sort-run-{index:04}.tmp"));
    let mut writer = BufWriter::new(File::create(&path)?);
    for (_, line) in run.iter() {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    run.clear();
    Ok(path)
}

fn merge_runs<W: Write>(run_paths: &[PathBuf], writer: &mut W) -> AnnotariumResult<()> {
    let mut readers: Vec<BufReader<File>> = run_paths
        .iter()
        .map(|p| File::open(p).map(BufReader::new))
        .collect::<Result<_, _>>()?;
    let mut ordinals = vec![0u64; readers.len()];
    let mut heap = BinaryHeap::new();

    for run in 0..readers.len() {
        if let Some(entry) = next_entry(&mut readers[run], run, &mut ordinals[run])? {
            heap.push(entry);
        }
    }

    while let Some(entry) = heap.pop() {
        writer.write_all(entry.line.as_bytes())?;
        writer.write_all(b"\n")?;
        let run = entry.run;
        if let Some(next) = next_entry(&mut readers[run], run, &mut ordinals[run])? {
            heap.push(next);
        }
    }
    Ok(())
}

fn next_entry(
    reader: &mut BufReader<File>,
    run: usize,
    ordinal: &mut u64,
) -> AnnotariumResult<Option<MergeEntry>> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches('\n');
        if trimmed.is_empty() {
            continue;
        }
        let key = sort_key(trimmed)?;
        *ordinal += 1;
        return Ok(Some(MergeEntry {
            seqid: key.seqid,
            start: key.start,
            run,
            ordinal: *ordinal,
            line: trimmed.to_string(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn line(seqid: &str, start: u64, attr: &str) -> String {
        format!("{seqid}\tsrc\tgene\t{start}\t{}\t.\t+\t.\tID={attr}", start + 10)
    }

    fn run_sort(content: &str, run_capacity: usize) -> (String, SortOutcome) {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.gff");
        let output = dir.path().join("out.gff");
        std::fs::write(&input, content).unwrap();
        let outcome = sort_gff(&input, &output, dir.path(), run_capacity).unwrap();
        (std::fs::read_to_string(&output).unwrap(), outcome)
    }

    #[test]
    fn test_sorts_by_seqid_then_start() {
        let content = format!(
            "##gff-version 3\n{}\n{}\n{}\n{}\n",
            line("2", 100, "a"),
            line("1", 500, "b"),
            line("1", 100, "c"),
            line("10", 1, "d"),
        );
        let (sorted, outcome) = run_sort(&content, 100);

        let ids: Vec<&str> = sorted
            .lines()
            .filter(|l| !l.starts_with('#'))
            .map(|l| l.rsplit('=').next().unwrap())
            .collect();
        // lexicographic seqid order: "1" < "10" < "2"
        assert_eq!(ids, vec!["c", "b", "d", "a"]);
        assert!(sorted.starts_with("##gff-version 3\n"));
        assert_eq!(outcome.header_lines, 1);
        assert_eq!(outcome.data_lines, 4);
    }

    #[test]
    fn test_external_merge_matches_in_memory() {
        let mut content = String::new();
        for i in (0..500).rev() {
            content.push_str(&line("1", i * 3 % 997, &format!("f{i}")));
            content.push('\n');
        }
        let (in_memory, outcome_a) = run_sort(&content, 100_000);
        let (external, outcome_b) = run_sort(&content, 37);
        assert_eq!(in_memory, external);
        assert_eq!(outcome_a.digest, outcome_b.digest);
    }

    #[test]
    fn test_stable_on_equal_keys() {
        let content = format!(
            "{}\n{}\n{}\n",
            line("1", 50, "first"),
            line("1", 50, "second"),
            line("1", 50, "third"),
        );
        let (sorted, _) = run_sort(&content, 2);
        let ids: Vec<&str> = sorted.lines().map(|l| l.rsplit('=').next().unwrap()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_digest_is_of_sorted_bytes() {
        let content = format!("{}\n{}\n", line("2", 5, "x"), line("1", 5, "y"));
        let (sorted, outcome) = run_sort(&content, 100);
        assert_eq!(outcome.digest, Md5Digest::of_bytes(sorted.as_bytes()));
    }

    #[test]
    fn test_empty_input() {
        let (sorted, outcome) = run_sort("", 100);
        assert!(sorted.is_empty());
        assert_eq!(outcome.data_lines, 0);
    }

    #[test]
    fn test_malformed_start_errors() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.gff");
        let output = dir.path().join("out.gff");
        std::fs::write(&input, "1\tsrc\tgene\tNaN\t10\t.\t+\t.\tID=x\n").unwrap();
        assert!(sort_gff(&input, &output, dir.path(), 10).is_err());
    }
}
