//! Feature-type vocabulary for the statistician

use serde::{Deserialize, Serialize};

/// Types that classify a record as a gene candidate.
pub const GENE_TYPES: &[&str] = &[
    "gene",
    "ncRNA_gene",
    "pseudogene",
    "protein_coding_gene",
    "pseudogenic_gene",
];

/// Known transcript-like types; anything parenting sub-features but absent
/// here still counts as a transcript under the `transcript` fallback label.
pub const TRANSCRIPT_TYPES: &[&str] = &[
    "mRNA",
    "transcript",
    "ncRNA",
    "tRNA",
    "rRNA",
    "snRNA",
    "snoRNA",
    "miRNA",
    "lnc_RNA",
    "pre_miRNA",
    "scRNA",
    "piRNA",
    "guide_RNA",
    "antisense_RNA",
    "ribozyme",
    "SRP_RNA",
    "RNase_P_RNA",
    "RNase_MRP_RNA",
    "telomerase_RNA",
    "tmRNA",
    "Y_RNA",
    "pseudogenic_transcript",
    "primary_transcript",
    "miRNA_primary_transcript",
    "unconfirmed_transcript",
    "V_gene_segment",
    "D_gene_segment",
    "J_gene_segment",
    "C_gene_segment",
];

/// Counted sub-feature types.
pub const SUB_FEATURE_TYPES: &[&str] = &["exon", "CDS"];

/// Landscape rows excluded from all counting.
pub const REGION_TYPES: &[&str] = &[
    "chromosome",
    "contig",
    "scaffold",
    "supercontig",
    "region",
    "biological_region",
    "sequence_feature",
    "assembly_component",
    "match",
    "cDNA_match",
];

/// Bucket label for features without a biotype attribute.
pub const BIOTYPE_MISSING: &str = "biotype_missing";

/// Fallback label for transcripts of unknown type.
pub const DEFAULT_TRANSCRIPT_TYPE: &str = "transcript";

pub fn is_gene_type(feature_type: &str) -> bool {
    GENE_TYPES.contains(&feature_type)
}

pub fn is_transcript_type(feature_type: &str) -> bool {
    TRANSCRIPT_TYPES.contains(&feature_type)
}

pub fn is_sub_feature_type(feature_type: &str) -> bool {
    SUB_FEATURE_TYPES.contains(&feature_type)
}

pub fn is_region_type(feature_type: &str) -> bool {
    REGION_TYPES.contains(&feature_type)
}

/// The three buckets genes are partitioned into, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneCategory {
    Coding,
    NonCoding,
    Pseudogene,
}

impl GeneCategory {
    pub const ALL: [GeneCategory; 3] = [
        GeneCategory::Coding,
        GeneCategory::NonCoding,
        GeneCategory::Pseudogene,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GeneCategory::Coding => "coding",
            GeneCategory::NonCoding => "non_coding",
            GeneCategory::Pseudogene => "pseudogene",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            GeneCategory::Coding => 0,
            GeneCategory::NonCoding => 1,
            GeneCategory::Pseudogene => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_membership() {
        assert!(is_gene_type("gene"));
        assert!(is_gene_type("ncRNA_gene"));
        assert!(is_transcript_type("mRNA"));
        assert!(is_transcript_type("lnc_RNA"));
        assert!(is_sub_feature_type("exon"));
        assert!(is_sub_feature_type("CDS"));
        assert!(is_region_type("chromosome"));
        assert!(!is_transcript_type("gene"));
        assert!(!is_gene_type("mRNA"));
    }

    #[test]
    fn test_category_order() {
        let labels: Vec<&str> = GeneCategory::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(labels, vec!["coding", "non_coding", "pseudogene"]);
    }
}
