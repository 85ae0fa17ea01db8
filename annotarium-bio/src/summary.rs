//! Single-pass feature overview of a GFF stream

use crate::gff::record::parse_attributes;
use annotarium_core::AnnotariumResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;

const BIOTYPE_KEYS: [&str; 3] = ["biotype", "gene_biotype", "transcript_biotype"];

/// Structural overview of the features in one annotation, collected in a
/// single streaming pass. The value sets double as the allowed-values lists
/// for region-stream filter validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureOverview {
    pub attribute_keys: BTreeSet<String>,
    pub feature_types: BTreeSet<String>,
    pub sources: BTreeSet<String>,
    pub biotypes: BTreeSet<String>,
    pub types_missing_id: BTreeSet<String>,
    /// Types of features carrying no `Parent`, with counts
    pub root_types: BTreeMap<String, u64>,
    pub has_biotype: bool,
    pub has_cds: bool,
    pub has_exon: bool,
}

impl FeatureOverview {
    /// Scan a GFF stream. Rows with fewer than nine tab-separated columns
    /// are ignored.
    pub fn scan<R: BufRead>(reader: R) -> AnnotariumResult<Self> {
        let mut overview = FeatureOverview::default();
        for line in reader.lines() {
            overview.absorb(&line?);
        }
        overview.has_biotype = !overview.biotypes.is_empty();
        Ok(overview)
    }

    /// Scan an already-decoded line stream (e.g. out of a bgzf reader).
    pub fn scan_lines<I>(lines: I) -> AnnotariumResult<Self>
    where
        I: IntoIterator<Item = AnnotariumResult<String>>,
    {
        let mut overview = FeatureOverview::default();
        for line in lines {
            overview.absorb(&line?);
        }
        overview.has_biotype = !overview.biotypes.is_empty();
        Ok(overview)
    }

    fn absorb(&mut self, line: &str) {
        if line.is_empty() || line.starts_with('#') {
            return;
        }
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 9 {
            return;
        }

        let source = cols[1].trim();
        let feature_type = cols[2].trim();
        let attrs = parse_attributes(cols[8]);

        self.sources.insert(source.to_string());
        self.feature_types.insert(feature_type.to_string());
        for key in attrs.keys() {
            self.attribute_keys.insert(key.clone());
        }
        for key in BIOTYPE_KEYS {
            if let Some(value) = attrs.get(key) {
                self.biotypes.insert(value.clone());
            }
        }
        if !attrs.contains_key("ID") {
            self.types_missing_id.insert(feature_type.to_string());
        }
        if !attrs.contains_key("Parent") {
            *self.root_types.entry(feature_type.to_string()).or_insert(0) += 1;
        }
        match feature_type {
            "CDS" => self.has_cds = true,
            "exon" => self.has_exon = true,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const GFF: &str = "\
##gff-version 3
1\tensembl\tgene\t100\t900\t.\t+\t.\tID=g1;biotype=protein_coding
1\tensembl\tmRNA\t100\t900\t.\t+\t.\tID=t1;Parent=g1;transcript_biotype=protein_coding
1\tensembl\texon\t100\t400\t.\t+\t.\tParent=t1
1\tensembl\tCDS\t150\t380\t.\t+\t0\tID=c1;Parent=t1
1\thavana\tpseudogene\t2000\t2500\t.\t-\t.\tID=g2;biotype=pseudogene
short\tline
";

    #[test]
    fn test_scan_collects_universe() {
        let overview = FeatureOverview::scan(Cursor::new(GFF)).unwrap();

        assert!(overview.has_cds);
        assert!(overview.has_exon);
        assert!(overview.has_biotype);

        assert_eq!(
            overview.sources,
            BTreeSet::from(["ensembl".to_string(), "havana".to_string()])
        );
        assert_eq!(
            overview.feature_types,
            BTreeSet::from([
                "CDS".to_string(),
                "exon".to_string(),
                "gene".to_string(),
                "mRNA".to_string(),
                "pseudogene".to_string(),
            ])
        );
        assert_eq!(
            overview.biotypes,
            BTreeSet::from(["protein_coding".to_string(), "pseudogene".to_string()])
        );
        // exon line has no ID
        assert!(overview.types_missing_id.contains("exon"));
        assert!(!overview.types_missing_id.contains("CDS"));
        // root features: gene and pseudogene (no Parent)
        assert_eq!(overview.root_types.get("gene"), Some(&1));
        assert_eq!(overview.root_types.get("pseudogene"), Some(&1));
        assert_eq!(overview.root_types.get("mRNA"), None);
    }

    #[test]
    fn test_scan_empty_stream() {
        let overview = FeatureOverview::scan(Cursor::new("")).unwrap();
        assert!(!overview.has_biotype);
        assert!(overview.feature_types.is_empty());
        assert!(overview.root_types.is_empty());
    }
}
