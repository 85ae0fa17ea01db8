//! Assembly resolver: bulk summary fetch plus bounded report fan-out

pub mod report;

use crate::catalog::Candidate;
use crate::fetch::fetch_text;
use annotarium_core::{AnnotariumResult, RateLimiter};
use annotarium_store::{AssemblyStats, Filter, GenomeAssembly, GenomicSequence, MetadataStore};
use anyhow::Context;
use chrono::NaiveDate;
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};
use tokio::sync::Semaphore;
use tracing::{info, warn};

pub struct AssemblyResolver {
    base_url: String,
    report_concurrency: usize,
}

impl AssemblyResolver {
    pub fn new(base_url: impl Into<String>, report_concurrency: usize) -> Self {
        Self {
            base_url: base_url.into(),
            report_concurrency: report_concurrency.max(1),
        }
    }

    fn report_url(&self, accession: &str) -> String {
        format!("{}/genome/accession/{}/assembly_report.txt", self.base_url, accession)
    }

    /// Ensure every assembly referenced by the batch exists in the store
    /// with its assembled-molecule sequences. Returns the accessions that
    /// are available after this step.
    pub async fn resolve_batch(
        &self,
        store: &MetadataStore,
        client: &reqwest::Client,
        rate: &mut RateLimiter,
        candidates: &[Candidate],
        lineages: &HashMap<u32, Vec<u32>>,
    ) -> AnnotariumResult<HashSet<String>> {
        let mut available: HashSet<String> = HashSet::new();
        let mut unseen: Vec<&Candidate> = Vec::new();
        let mut seen_accessions: HashSet<&str> = HashSet::new();

        for candidate in candidates {
            if !seen_accessions.insert(&candidate.assembly_accession) {
                continue;
            }
            if store
                .get::<GenomeAssembly>(&candidate.assembly_accession)?
                .is_some()
            {
                available.insert(candidate.assembly_accession.clone());
            } else {
                unseen.push(candidate);
            }
        }
        if unseen.is_empty() {
            return Ok(available);
        }

        rate.tick().await;
        let summaries = match self.fetch_summaries(client, &unseen).await {
            Ok(summaries) => summaries,
            Err(e) => {
                warn!(error = %e, "assembly summary fetch failed; dropping unseen assemblies");
                return Ok(available);
            }
        };

        let mut new_assemblies: Vec<GenomeAssembly> = Vec::new();
        for candidate in &unseen {
            let Some(summary) = summaries.get(candidate.assembly_accession.as_str()) else {
                warn!(
                    accession = candidate.assembly_accession,
                    "assembly missing from catalog summary"
                );
                continue;
            };
            let Some(lineage) = lineages.get(&candidate.taxon_id) else {
                continue;
            };
            new_assemblies.push(self.build_assembly(candidate, summary, lineage));
        }

        if let Err(e) = store.insert_many(&new_assemblies) {
            warn!(error = %e, "assembly batch insert failed");
            return Ok(available);
        }

        // Bounded fan-out over the per-assembly sequence reports.
        let semaphore = Semaphore::new(self.report_concurrency);
        let fetches = new_assemblies.iter().map(|assembly| {
            let sem = &semaphore;
            let accession = assembly.assembly_accession.clone();
            let name = assembly.assembly_name.clone();
            let url = self.report_url(&assembly.assembly_accession);
            async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                let result = fetch_text(client, &url).await;
                (accession, name, result)
            }
        });
        let mut results = stream::iter(fetches).buffer_unordered(self.report_concurrency);

        while let Some((accession, name, result)) = results.next().await {
            let sequences = match result {
                Ok(text) => report::parse_report(&text, &accession, &name),
                Err(e) => {
                    warn!(accession, error = %e, "assembly report fetch failed; rolling back");
                    self.rollback(store, &accession)?;
                    continue;
                }
            };
            match store.insert_many(&sequences) {
                Ok(()) => {
                    available.insert(accession);
                }
                Err(e) => {
                    warn!(accession, error = %e, "sequence batch insert failed; rolling back");
                    self.rollback(store, &accession)?;
                }
            }
        }

        info!(available = available.len(), "assembly batch resolved");
        Ok(available)
    }

    async fn fetch_summaries(
        &self,
        client: &reqwest::Client,
        unseen: &[&Candidate],
    ) -> anyhow::Result<HashMap<String, AssemblySummary>> {
        let joined = unseen
            .iter()
            .map(|c| c.assembly_accession.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}/genome/accession/{}/dataset_report", self.base_url, joined);
        let body = fetch_text(client, &url).await?;
        let response: DatasetReportResponse =
            serde_json::from_str(&body).context("invalid assembly summary response")?;
        Ok(response
            .reports
            .into_iter()
            .map(|summary| (summary.accession.clone(), summary))
            .collect())
    }

    fn build_assembly(
        &self,
        candidate: &Candidate,
        summary: &AssemblySummary,
        lineage: &[u32],
    ) -> GenomeAssembly {
        let info = summary.assembly_info.as_ref();
        GenomeAssembly {
            assembly_accession: summary.accession.clone(),
            paired_assembly_accession: summary.paired_accession.clone(),
            assembly_name: info
                .and_then(|i| i.assembly_name.clone())
                .unwrap_or_else(|| candidate.assembly_name.clone()),
            submitter: info.and_then(|i| i.submitter.clone()),
            release_date: info.and_then(|i| i.release_date),
            source_db: candidate.source_db.clone(),
            stats: summary.assembly_stats.clone().unwrap_or_default(),
            taxid: candidate.taxon_id,
            organism_name: candidate.organism_name.clone(),
            taxon_lineage: lineage.to_vec(),
            download_url: self.report_url(&summary.accession),
            annotations_count: 0,
        }
    }

    /// Remove a partially inserted assembly and any of its sequences.
    fn rollback(&self, store: &MetadataStore, accession: &str) -> AnnotariumResult<()> {
        store.delete_where::<GenomicSequence>(&Filter::eq("assembly_accession", accession))?;
        store.delete::<GenomeAssembly>(accession)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct DatasetReportResponse {
    #[serde(default)]
    reports: Vec<AssemblySummary>,
}

#[derive(Debug, Clone, Deserialize)]
struct AssemblySummary {
    accession: String,
    paired_accession: Option<String>,
    assembly_info: Option<AssemblyInfo>,
    #[serde(default, deserialize_with = "lenient_stats")]
    assembly_stats: Option<AssemblyStats>,
}

#[derive(Debug, Clone, Deserialize)]
struct AssemblyInfo {
    assembly_name: Option<String>,
    submitter: Option<String>,
    release_date: Option<NaiveDate>,
}

/// The assembly catalog serializes numeric statistics inconsistently
/// (strings or numbers); coerce both.
fn lenient_stats<'de, D>(deserializer: D) -> Result<Option<AssemblyStats>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    let Some(serde_json::Value::Object(map)) = raw else {
        return Ok(None);
    };

    let as_u64 = |key: &str| -> Option<u64> {
        match map.get(key) {
            Some(serde_json::Value::Number(n)) => n.as_u64(),
            Some(serde_json::Value::String(s)) => s.parse().ok(),
            _ => None,
        }
    };
    let as_f64 = |key: &str| -> Option<f64> {
        match map.get(key) {
            Some(serde_json::Value::Number(n)) => n.as_f64(),
            Some(serde_json::Value::String(s)) => s.parse().ok(),
            _ => None,
        }
    };

    Ok(Some(AssemblyStats {
        total_sequence_length: as_u64("total_sequence_length"),
        total_ungapped_length: as_u64("total_ungapped_length"),
        number_of_contigs: as_u64("number_of_contigs"),
        contig_n50: as_u64("contig_n50"),
        contig_l50: as_u64("contig_l50"),
        number_of_scaffolds: as_u64("number_of_scaffolds"),
        scaffold_n50: as_u64("scaffold_n50"),
        scaffold_l50: as_u64("scaffold_l50"),
        gc_count: as_u64("gc_count"),
        gc_percent: as_f64("gc_percent"),
        genome_coverage: as_f64("genome_coverage"),
        number_of_organelles: as_u64("number_of_organelles"),
        total_number_of_chromosomes: as_u64("total_number_of_chromosomes"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_stats_parsing() {
        let raw = r#"{
            "accession": "GCA_000001405.15",
            "paired_accession": "GCF_000001405.26",
            "assembly_info": {"assembly_name": "GRCh38", "submitter": "GRC", "release_date": "2013-12-17"},
            "assembly_stats": {
                "total_sequence_length": "3099734149",
                "contig_n50": 56413054,
                "gc_percent": "41.0",
                "number_of_organelles": 1
            }
        }"#;
        let summary: AssemblySummary = serde_json::from_str(raw).unwrap();
        let stats = summary.assembly_stats.unwrap();
        assert_eq!(stats.total_sequence_length, Some(3099734149));
        assert_eq!(stats.contig_n50, Some(56413054));
        assert_eq!(stats.gc_percent, Some(41.0));
        assert_eq!(stats.number_of_organelles, Some(1));
        assert_eq!(stats.scaffold_n50, None);
    }
}
