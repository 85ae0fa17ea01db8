//! Ingestion orchestrator: one whole pipeline run
//!
//! Drives discovery, admission, enrichment, per-candidate processing, and
//! publication in batches. Per-candidate errors are persisted and never
//! escape the candidate; per-batch store errors roll back that batch's
//! artifacts and never escape the batch.

use crate::admission::filter_candidates;
use crate::alias_map::AliasMap;
use crate::assembly::AssemblyResolver;
use crate::catalog::{stream_catalogs, Candidate};
use crate::counts::DerivedCountsMaintainer;
use crate::fetch::build_client;
use crate::processor::{GffProcessor, ProcessedAnnotation};
use crate::taxonomy::ena::{EnaBrowserSource, EnaPortalSource};
use crate::taxonomy::ncbi::NcbiTaxonomySource;
use crate::taxonomy::TaxonomyResolver;
use annotarium_core::system::{remove_file_and_empty_parents, utc_now};
use annotarium_core::{Config, RateLimiter};
use annotarium_store::{
    Annotation, AnnotationError, AnnotationSequenceMap, Filter, IndexedFileInfo, MetadataStore,
    SourceFileInfo,
};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Outcome summary of one orchestrator run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub discovered: usize,
    pub admitted: usize,
    pub taxonomy_resolved: usize,
    pub assembly_resolved: usize,
    pub published: usize,
    pub replaced: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub cancelled: bool,
}

pub struct Orchestrator {
    config: Config,
    store: Arc<MetadataStore>,
    client: reqwest::Client,
    cancelled: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(config: Config, store: Arc<MetadataStore>) -> Result<Self> {
        let client = build_client(config.ingestion.http_timeout_secs)?;
        Ok(Self {
            config,
            store,
            client,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Shared flag checked between candidates; an in-flight candidate
    /// completes or errors before cancellation takes effect.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub async fn run(&self) -> Result<IngestReport> {
        self.config.validate_for_ingestion()?;
        let mut report = IngestReport::default();
        let counts = DerivedCountsMaintainer::new(&self.store);

        // 1. reap orphans left over from prior runs
        counts.sweep_all()?;

        // 2. discovery
        let candidates = self.discover().await?;
        report.discovered = candidates.len();

        // 3. admission
        let admitted = filter_candidates(&self.store, candidates)?;
        report.admitted = admitted.len();
        info!(
            discovered = report.discovered,
            admitted = report.admitted,
            "admission complete"
        );

        // 4. taxonomy enrichment; unresolved taxids drop their candidates
        let mut rate = RateLimiter::new(
            self.config.ingestion.rate_limit_calls,
            Duration::from_secs(self.config.ingestion.rate_limit_pause_secs),
        );
        let taxonomy = TaxonomyResolver::new(vec![
            Box::new(NcbiTaxonomySource::new(self.config.sources.ncbi_base.clone())),
            Box::new(EnaBrowserSource::new(
                self.config.sources.ena_browser_base.clone(),
            )),
            Box::new(EnaPortalSource::new(
                self.config.sources.ena_portal_base.clone(),
            )),
        ]);
        let taxid_names: Vec<(u32, String)> = admitted
            .iter()
            .map(|c| (c.taxon_id, c.organism_name.clone()))
            .collect();
        let lineages = taxonomy
            .resolve_batch(&self.store, &self.client, &mut rate, &taxid_names)
            .await?;
        let survivors: Vec<Candidate> = admitted
            .into_iter()
            .filter(|c| lineages.contains_key(&c.taxon_id))
            .collect();
        report.taxonomy_resolved = survivors.len();

        // 5. assembly enrichment; missing assemblies drop their candidates
        let assemblies = AssemblyResolver::new(
            self.config.sources.ncbi_base.clone(),
            self.config.ingestion.report_concurrency,
        );
        let available = assemblies
            .resolve_batch(&self.store, &self.client, &mut rate, &survivors, &lineages)
            .await?;
        let survivors: Vec<Candidate> = survivors
            .into_iter()
            .filter(|c| available.contains(&c.assembly_accession))
            .collect();
        report.assembly_resolved = survivors.len();

        // 6. process and publish in batches
        let processor = GffProcessor::new(
            &self.config.storage.annotations_root,
            &self.config.storage.downloads_cache_dir,
        );
        let mut saved: Vec<Annotation> = Vec::new();
        for batch in survivors.chunks(self.config.ingestion.batch_size.max(1)) {
            if self.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let published = self
                .run_batch(&processor, &lineages, batch, &mut report)
                .await?;
            saved.extend(published);
        }
        report.published = saved.len();

        // 7-8. derived counts over what was committed, then a final sweep
        counts.update_for(&saved)?;
        counts.sweep_all()?;

        info!(?report, "ingestion run complete");
        Ok(report)
    }

    async fn discover(&self) -> Result<Vec<Candidate>> {
        let (tx, mut rx) = mpsc::channel::<Candidate>(256);
        let client = self.client.clone();
        let urls = self.config.ingestion.catalog_urls.clone();
        let fetcher = tokio::spawn(async move { stream_catalogs(&client, &urls, tx).await });

        let mut candidates = Vec::new();
        while let Some(candidate) = rx.recv().await {
            candidates.push(candidate);
        }
        fetcher.await.context("catalog fetcher panicked")??;
        Ok(candidates)
    }

    /// Process one batch: per-item isolation, replacement of stale releases,
    /// all-or-nothing publication.
    async fn run_batch(
        &self,
        processor: &GffProcessor,
        lineages: &HashMap<u32, Vec<u32>>,
        batch: &[Candidate],
        report: &mut IngestReport,
    ) -> Result<Vec<Annotation>> {
        let mut alias_maps: HashMap<String, AliasMap> = HashMap::new();
        let mut accepted: Vec<(Annotation, Vec<AnnotationSequenceMap>)> = Vec::new();

        for candidate in batch {
            if self.is_cancelled() {
                report.cancelled = true;
                break;
            }
            match processor.process(&self.store, &self.client, candidate).await {
                Ok(Some(processed)) => {
                    let alias_map = match alias_maps.entry(candidate.assembly_accession.clone()) {
                        std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
                        std::collections::hash_map::Entry::Vacant(e) => {
                            e.insert(AliasMap::load(&self.store, &candidate.assembly_accession)?)
                        }
                    };
                    let (rows, mapped_regions) =
                        alias_map.map_contigs(&processed.annotation_id, &processed.contigs);
                    let lineage = lineages.get(&candidate.taxon_id).cloned().unwrap_or_default();
                    accepted.push((
                        build_annotation(candidate, &processed, lineage, mapped_regions),
                        rows,
                    ));
                }
                Ok(None) => {
                    report.unchanged += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(url = candidate.access_url, error = %e, "candidate failed");
                    if let Err(store_err) = self.record_error(candidate, &format!("{e:#}")) {
                        warn!(url = candidate.access_url, error = %store_err, "could not persist error row");
                    }
                }
            }
        }

        // a new release replaces the previous annotation for the same URL
        for (annotation, _) in &accepted {
            if let Err(e) = self.replace_stale(annotation, report) {
                warn!(
                    annotation_id = annotation.annotation_id,
                    error = %e,
                    "stale release cleanup failed"
                );
            }
            // a successful publish clears any prior error for this source
            if let Err(e) = self
                .store
                .delete::<AnnotationError>(&annotation.source_file_info.uncompressed_md5)
            {
                warn!(error = %e, "could not clear error row");
            }
        }

        let annotations: Vec<Annotation> = accepted.iter().map(|(a, _)| a.clone()).collect();
        if let Err(e) = self.store.insert_many(&annotations) {
            warn!(error = %e, "batch insert failed; removing batch artifacts");
            for (annotation, _) in &accepted {
                processor.remove_artifacts(
                    Path::new(&annotation.indexed_file_info.bgzipped_path),
                    Path::new(&annotation.indexed_file_info.csi_path),
                );
            }
            report.failed += accepted.len();
            return Ok(Vec::new());
        }

        for (_, rows) in &accepted {
            if let Err(e) = self.store.insert_many(rows) {
                warn!(error = %e, "sequence map insert failed");
            }
        }

        Ok(annotations)
    }

    /// Delete a prior annotation for the same source URL whose content
    /// changed, cascading to its artifacts and sequence-map rows.
    fn replace_stale(&self, incoming: &Annotation, report: &mut IngestReport) -> Result<()> {
        let Some(existing) = self
            .store
            .find_by_unique::<Annotation>("url_path", &incoming.source_file_info.url_path)?
        else {
            return Ok(());
        };
        if existing.annotation_id == incoming.annotation_id {
            return Ok(());
        }

        info!(
            old = existing.annotation_id,
            new = incoming.annotation_id,
            url = incoming.source_file_info.url_path,
            "replacing stale release"
        );
        let root = &self.config.storage.annotations_root;
        for rel in [
            &existing.indexed_file_info.csi_path,
            &existing.indexed_file_info.bgzipped_path,
        ] {
            remove_file_and_empty_parents(root, &root.join(rel))?;
        }
        self.store.delete_where::<AnnotationSequenceMap>(&Filter::eq(
            "annotation_id",
            existing.annotation_id.as_str(),
        ))?;
        self.store.delete::<Annotation>(&existing.annotation_id)?;
        report.replaced += 1;
        Ok(())
    }

    fn record_error(&self, candidate: &Candidate, message: &str) -> Result<()> {
        // a new declared MD5 for the same URL supersedes the old error row
        if let Some(previous) = self
            .store
            .find_by_unique::<AnnotationError>("url_path", &candidate.access_url)?
        {
            if previous.source_md5 != candidate.md5_checksum {
                self.store.delete::<AnnotationError>(&previous.source_md5)?;
            }
        }
        self.store.upsert(&AnnotationError {
            url_path: candidate.access_url.clone(),
            source_md5: candidate.md5_checksum.clone(),
            message: message.to_string(),
            source_db: candidate.source_db.clone(),
            taxid: candidate.taxon_id,
            organism_name: candidate.organism_name.clone(),
            assembly_accession: candidate.assembly_accession.clone(),
            assembly_name: candidate.assembly_name.clone(),
            release_date: candidate.release_date,
            last_modified_date: candidate.last_modified_date,
            created_at: utc_now(),
        })?;
        Ok(())
    }
}

fn build_annotation(
    candidate: &Candidate,
    processed: &ProcessedAnnotation,
    taxon_lineage: Vec<u32>,
    mapped_regions: Vec<String>,
) -> Annotation {
    Annotation {
        annotation_id: processed.annotation_id.clone(),
        taxid: candidate.taxon_id,
        organism_name: candidate.organism_name.clone(),
        taxon_lineage,
        assembly_accession: candidate.assembly_accession.clone(),
        assembly_name: candidate.assembly_name.clone(),
        source_file_info: SourceFileInfo {
            source_db: candidate.source_db.clone(),
            provider: candidate.provider.clone(),
            url_path: candidate.access_url.clone(),
            release_date: candidate.release_date,
            last_modified_date: candidate.last_modified_date,
            uncompressed_md5: candidate.md5_checksum.clone(),
            pipeline_name: candidate.pipeline_name.clone(),
            pipeline_version: candidate.pipeline_version.clone(),
            pipeline_method: candidate.pipeline_method.clone(),
        },
        indexed_file_info: IndexedFileInfo {
            bgzipped_path: processed.bgzipped_path.to_string_lossy().into_owned(),
            csi_path: processed.csi_path.to_string_lossy().into_owned(),
            file_size: processed.file_size,
            processed_at: utc_now(),
        },
        mapped_regions,
        features_summary: processed.features_summary.clone(),
        features_statistics: processed.features_statistics.clone(),
    }
}
