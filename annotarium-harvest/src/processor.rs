//! GFF processor: one candidate from remote stream to durable indexed
//! artifacts
//!
//! All intermediate files live in a per-candidate temp directory named after
//! the declared source MD5; the bgzipped file and its index land under the
//! annotations root only once fully written. Any failure removes the temp
//! directory and whatever partial artifacts reached the root.

use crate::catalog::Candidate;
use crate::fetch::{download_to_file, move_file};
use annotarium_bio::gff::{compress_and_index, sort_gff, sort::DEFAULT_RUN_CAPACITY};
use annotarium_bio::stats::FeatureStatsBuilder;
use annotarium_bio::{FeatureOverview, FeatureStatistics, IndexedGff};
use annotarium_core::system::{annotation_relative_path, csi_path_for, remove_file_and_empty_parents};
use annotarium_store::{Annotation, MetadataStore};
use anyhow::{bail, Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span};

/// Everything the orchestrator needs to publish one processed candidate.
#[derive(Debug)]
pub struct ProcessedAnnotation {
    pub annotation_id: String,
    /// Relative paths under the annotations root
    pub bgzipped_path: PathBuf,
    pub csi_path: PathBuf,
    pub file_size: u64,
    pub contigs: Vec<String>,
    pub features_summary: FeatureOverview,
    pub features_statistics: FeatureStatistics,
}

pub struct GffProcessor {
    annotations_root: PathBuf,
    downloads_cache: PathBuf,
}

impl GffProcessor {
    pub fn new(annotations_root: &Path, downloads_cache: &Path) -> Self {
        Self {
            annotations_root: annotations_root.to_path_buf(),
            downloads_cache: downloads_cache.to_path_buf(),
        }
    }

    /// Run the strict per-candidate sequence: download, sort, fingerprint,
    /// bgzip, index, summarize, analyze. Returns `Ok(None)` when the sorted
    /// content already exists under another catalog row (content unchanged).
    pub async fn process(
        &self,
        store: &MetadataStore,
        client: &reqwest::Client,
        candidate: &Candidate,
    ) -> Result<Option<ProcessedAnnotation>> {
        let _span = info_span!("gff_processor", source_md5 = %candidate.md5_checksum).entered();

        let workspace = self.downloads_cache.join(&candidate.md5_checksum);
        std::fs::create_dir_all(&workspace)
            .with_context(|| format!("cannot create workspace {}", workspace.display()))?;

        let result = self.process_in_workspace(store, client, candidate, &workspace).await;

        // the workspace is scratch space either way
        let _ = std::fs::remove_dir_all(&workspace);

        match &result {
            Err(e) => debug!(error = %e, "candidate failed"),
            Ok(None) => debug!("candidate content unchanged"),
            Ok(Some(p)) => info!(annotation_id = p.annotation_id, "candidate processed"),
        }
        result
    }

    async fn process_in_workspace(
        &self,
        store: &MetadataStore,
        client: &reqwest::Client,
        candidate: &Candidate,
        workspace: &Path,
    ) -> Result<Option<ProcessedAnnotation>> {
        // 1. download, verifying the catalog has not drifted from the source
        let download_path = workspace.join("source.download");
        let downloaded = download_to_file(client, &candidate.access_url, &download_path).await?;
        if downloaded.bytes == 0 {
            bail!("downloaded file is empty: {}", candidate.access_url);
        }
        if let (Some(remote), Some(declared)) =
            (downloaded.last_modified, candidate.last_modified_date)
        {
            if remote != declared {
                bail!(
                    "last-modified mismatch: remote {} vs catalog {} for {}",
                    remote,
                    declared,
                    candidate.access_url
                );
            }
        }

        let raw_path = workspace.join("raw.gff");
        if candidate.access_url.ends_with(".gz") {
            decompress(&download_path, &raw_path)?;
        } else {
            std::fs::rename(&download_path, &raw_path)?;
        }

        // 2-3. streaming sort + MD5 of the sorted bytes
        let sorted_path = workspace.join("sorted.gff");
        let sorted = sort_gff(&raw_path, &sorted_path, workspace, DEFAULT_RUN_CAPACITY)
            .context("sort failed")?;
        if sorted.data_lines == 0 {
            bail!("sorted GFF is empty: {}", candidate.access_url);
        }

        let annotation_id = sorted.digest.to_string();
        if store.get::<Annotation>(&annotation_id)?.is_some() {
            return Ok(None);
        }

        // 4-5. block-compress and index in the workspace
        let bgz_tmp = workspace.join("annotation.gff.gz");
        let csi_tmp = workspace.join("annotation.gff.gz.csi");
        let compressed =
            compress_and_index(&sorted_path, &bgz_tmp, &csi_tmp).context("indexing failed")?;

        // 6-7. feature overview and statistics from the indexed artifact
        let indexed = IndexedGff::open(&bgz_tmp, &csi_tmp)?;
        let features_summary = summarize(&indexed)?;
        let features_statistics = statistics(&indexed)?;

        // 8. artifacts land under the root only now, fully written
        let bgzipped_rel = annotation_relative_path(
            candidate.taxon_id,
            &candidate.assembly_accession,
            &candidate.source_db,
            &annotation_id,
        );
        let csi_rel = csi_path_for(&bgzipped_rel);
        let bgz_final = self.annotations_root.join(&bgzipped_rel);
        let csi_final = self.annotations_root.join(&csi_rel);

        if let Err(e) = move_file(&bgz_tmp, &bgz_final)
            .and_then(|()| move_file(&csi_tmp, &csi_final))
        {
            self.remove_artifacts(&bgzipped_rel, &csi_rel);
            return Err(e);
        }

        Ok(Some(ProcessedAnnotation {
            annotation_id,
            bgzipped_path: bgzipped_rel,
            csi_path: csi_rel,
            file_size: compressed.file_size,
            contigs: compressed.contigs,
            features_summary,
            features_statistics,
        }))
    }

    /// Remove published artifacts (and newly-empty parents) for a candidate
    /// whose batch failed after publication.
    pub fn remove_artifacts(&self, bgzipped_rel: &Path, csi_rel: &Path) {
        for rel in [csi_rel, bgzipped_rel] {
            let _ = remove_file_and_empty_parents(&self.annotations_root, &self.annotations_root.join(rel));
        }
    }
}

fn decompress(from: &Path, to: &Path) -> Result<()> {
    let mut decoder = MultiGzDecoder::new(BufReader::new(File::open(from)?));
    let mut out = BufWriter::new(File::create(to)?);
    std::io::copy(&mut decoder, &mut out).context("gzip decompression failed")?;
    out.flush()?;
    Ok(())
}

fn summarize(indexed: &IndexedGff) -> Result<FeatureOverview> {
    Ok(FeatureOverview::scan_lines(indexed.scan()?)?)
}

fn statistics(indexed: &IndexedGff) -> Result<FeatureStatistics> {
    let mut builder = FeatureStatsBuilder::default();
    for line in indexed.scan()? {
        builder.push_line(&line?)?;
    }
    Ok(builder.finish())
}
