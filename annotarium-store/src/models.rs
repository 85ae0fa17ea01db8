//! Persisted entities

use crate::backend::cf_names;
use crate::document::Document;
use annotarium_bio::{FeatureOverview, FeatureStatistics};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Provenance of one annotation as declared by its catalog row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFileInfo {
    pub source_db: String,
    pub provider: String,
    pub url_path: String,
    pub release_date: Option<NaiveDate>,
    pub last_modified_date: Option<NaiveDate>,
    /// MD5 declared by the catalog for the uncompressed source
    pub uncompressed_md5: String,
    pub pipeline_name: Option<String>,
    pub pipeline_version: Option<String>,
    pub pipeline_method: Option<String>,
}

/// Durable artifact locations, relative to the annotations root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedFileInfo {
    pub bgzipped_path: String,
    pub csi_path: String,
    pub file_size: u64,
    pub processed_at: DateTime<Utc>,
}

/// One published GFF file plus its metadata. The id is the hex MD5 of the
/// sorted uncompressed GFF bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub annotation_id: String,
    pub taxid: u32,
    pub organism_name: String,
    /// Species -> root order, universal root excluded
    pub taxon_lineage: Vec<u32>,
    pub assembly_accession: String,
    pub assembly_name: String,
    pub source_file_info: SourceFileInfo,
    pub indexed_file_info: IndexedFileInfo,
    /// GFF seqids that resolved to known chromosomes
    pub mapped_regions: Vec<String>,
    pub features_summary: FeatureOverview,
    pub features_statistics: FeatureStatistics,
}

impl Document for Annotation {
    const COLLECTION: &'static str = cf_names::ANNOTATIONS;

    fn id(&self) -> String {
        self.annotation_id.clone()
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![
            ("url_path", self.source_file_info.url_path.clone()),
            (
                "uncompressed_md5",
                self.source_file_info.uncompressed_md5.clone(),
            ),
            (
                "bgzipped_path",
                self.indexed_file_info.bgzipped_path.clone(),
            ),
        ]
    }
}

/// High-level numeric assembly statistics from the assembly catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssemblyStats {
    pub total_sequence_length: Option<u64>,
    pub total_ungapped_length: Option<u64>,
    pub number_of_contigs: Option<u64>,
    pub contig_n50: Option<u64>,
    pub contig_l50: Option<u64>,
    pub number_of_scaffolds: Option<u64>,
    pub scaffold_n50: Option<u64>,
    pub scaffold_l50: Option<u64>,
    pub gc_count: Option<u64>,
    pub gc_percent: Option<f64>,
    pub genome_coverage: Option<f64>,
    pub number_of_organelles: Option<u64>,
    pub total_number_of_chromosomes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeAssembly {
    pub assembly_accession: String,
    pub paired_assembly_accession: Option<String>,
    pub assembly_name: String,
    pub submitter: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub source_db: String,
    pub stats: AssemblyStats,
    pub taxid: u32,
    pub organism_name: String,
    pub taxon_lineage: Vec<u32>,
    pub download_url: String,
    pub annotations_count: u64,
}

impl Document for GenomeAssembly {
    const COLLECTION: &'static str = cf_names::ASSEMBLIES;

    fn id(&self) -> String {
        self.assembly_accession.clone()
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("download_url", self.download_url.clone())]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organism {
    pub taxid: u32,
    pub organism_name: String,
    pub common_name: Option<String>,
    pub taxon_lineage: Vec<u32>,
    pub annotations_count: u64,
    pub assemblies_count: u64,
}

impl Document for Organism {
    const COLLECTION: &'static str = cf_names::ORGANISMS;

    fn id(&self) -> String {
        self.taxid.to_string()
    }
}

/// One node of the taxonomy tree. `children` is maintained with add-to-set
/// so repeated lineage writes stay idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonNode {
    pub taxid: u32,
    pub scientific_name: String,
    pub rank: Option<String>,
    pub children: BTreeSet<u32>,
    pub annotations_count: u64,
    pub assemblies_count: u64,
    pub organisms_count: u64,
}

impl Document for TaxonNode {
    const COLLECTION: &'static str = cf_names::TAXA;

    fn id(&self) -> String {
        self.taxid.to_string()
    }
}

/// An assembled molecule of an assembly with its precomputed alias set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomicSequence {
    pub assembly_accession: String,
    pub assembly_name: String,
    pub insdc_accession: Option<String>,
    pub refseq_accession: Option<String>,
    pub ucsc_style_name: Option<String>,
    pub assigned_molecule: Option<String>,
    pub sequence_name: String,
    pub length: Option<u64>,
    pub aliases: BTreeSet<String>,
}

impl Document for GenomicSequence {
    const COLLECTION: &'static str = cf_names::SEQUENCES;

    fn id(&self) -> String {
        format!("{}:{}", self.assembly_accession, self.sequence_name)
    }
}

/// One (annotation, GFF seqid) row carrying the resolved chromosome's
/// aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSequenceMap {
    pub annotation_id: String,
    /// Sequence identifier as seen in the GFF's first column
    pub sequence_id: String,
    pub aliases: BTreeSet<String>,
}

impl Document for AnnotationSequenceMap {
    const COLLECTION: &'static str = cf_names::SEQUENCE_MAPS;

    fn id(&self) -> String {
        format!("{}:{}", self.annotation_id, self.sequence_id)
    }
}

/// Persisted failure of a candidate; suppresses retries until cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationError {
    pub url_path: String,
    pub source_md5: String,
    pub message: String,
    pub source_db: String,
    pub taxid: u32,
    pub organism_name: String,
    pub assembly_accession: String,
    pub assembly_name: String,
    pub release_date: Option<NaiveDate>,
    pub last_modified_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Document for AnnotationError {
    const COLLECTION: &'static str = cf_names::ERRORS;

    fn id(&self) -> String {
        self.source_md5.clone()
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("url_path", self.url_path.clone())]
    }
}
