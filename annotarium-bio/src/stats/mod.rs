//! Multi-pass structural statistics over a sorted GFF stream
//!
//! Records are buffered into windows bounded by seqid boundaries and a line
//! threshold, so the parent/child interaction graph of a window always fits
//! in memory while the aggregates roll across the whole file. Each window
//! gets three passes: sub-features, transcripts, genes.

pub mod rolling;
pub mod vocab;

pub use rolling::{LengthStats, RunningStats};
pub use vocab::GeneCategory;

use crate::gff::record::GffRecord;
use annotarium_core::AnnotariumResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::BufRead;
use vocab::{
    is_gene_type, is_region_type, is_sub_feature_type, is_transcript_type, BIOTYPE_MISSING,
    DEFAULT_TRANSCRIPT_TYPE,
};

/// Lines buffered before a window may flush (at the next seqid boundary).
pub const DEFAULT_WINDOW_THRESHOLD: usize = 200_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureStatistics {
    /// Emitted in fixed order: coding, non_coding, pseudogene
    pub gene_categories: Vec<GeneCategoryStats>,
    /// Emitted sorted by total count descending
    pub transcript_types: Vec<TranscriptTypeStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneCategoryStats {
    pub category: GeneCategory,
    pub total: u64,
    pub length: LengthStats,
    pub biotypes: BTreeMap<String, u64>,
    pub transcript_types: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptTypeStats {
    pub transcript_type: String,
    pub total: u64,
    pub length: LengthStats,
    pub biotypes: BTreeMap<String, u64>,
    pub genes: AssociatedGeneStats,
    pub exon_stats: SubFeatureStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cds_stats: Option<SubFeatureStats>,
    pub has_multiple_exons: bool,
    pub has_cds: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssociatedGeneStats {
    pub total_unique: u64,
    pub by_category: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubFeatureStats {
    pub total: u64,
    /// Per-sub-feature lengths
    pub length: LengthStats,
    /// Per-parent concatenated (spliced) lengths
    pub concatenated_length: LengthStats,
}

/// Streaming builder; feed lines, then `finish`.
pub struct FeatureStatsBuilder {
    threshold: usize,
    window: Vec<GffRecord>,
    current_seqid: Option<String>,
    acc: Accumulator,
}

impl Default for FeatureStatsBuilder {
    fn default() -> Self {
        Self::with_threshold(DEFAULT_WINDOW_THRESHOLD)
    }
}

impl FeatureStatsBuilder {
    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            window: Vec::new(),
            current_seqid: None,
            acc: Accumulator::default(),
        }
    }

    /// Compute statistics for a whole GFF stream.
    pub fn compute<R: BufRead>(reader: R) -> AnnotariumResult<FeatureStatistics> {
        let mut builder = Self::default();
        for line in reader.lines() {
            builder.push_line(&line?)?;
        }
        Ok(builder.finish())
    }

    pub fn push_line(&mut self, line: &str) -> AnnotariumResult<()> {
        let Some(record) = GffRecord::parse(line)? else {
            return Ok(());
        };
        self.push_record(record);
        Ok(())
    }

    pub fn push_record(&mut self, record: GffRecord) {
        // A window may only close where the seqid changes, so parent links
        // never straddle two windows.
        if let Some(current) = &self.current_seqid {
            if *current != record.seqid && self.window.len() >= self.threshold {
                let window = std::mem::take(&mut self.window);
                self.acc.process_window(&window);
            }
        }
        self.current_seqid = Some(record.seqid.clone());
        self.window.push(record);
    }

    pub fn finish(mut self) -> FeatureStatistics {
        if !self.window.is_empty() {
            let window = std::mem::take(&mut self.window);
            self.acc.process_window(&window);
        }
        self.acc.finalize()
    }
}

#[derive(Debug, Default)]
struct SubLens {
    exons: Vec<u64>,
    cds: Vec<u64>,
}

#[derive(Debug)]
struct TranscriptRec {
    transcript_type: String,
    biotype: Option<String>,
    gene: Option<String>,
    length: u64,
    exons: Vec<u64>,
    cds: Vec<u64>,
}

#[derive(Debug)]
struct GeneRec {
    id: Option<String>,
    feature_type: String,
    biotype: Option<String>,
    length: u64,
}

#[derive(Debug, Default)]
struct CategoryAcc {
    total: u64,
    length: RunningStats,
    biotypes: BTreeMap<String, u64>,
    transcript_types: BTreeMap<String, u64>,
}

#[derive(Debug, Default)]
struct SubFeatureAcc {
    total: u64,
    length: RunningStats,
    concatenated: RunningStats,
}

impl SubFeatureAcc {
    fn add_parent(&mut self, lengths: &[u64]) {
        self.total += lengths.len() as u64;
        for &len in lengths {
            self.length.add(len);
        }
        self.concatenated.add(lengths.iter().sum());
    }

    fn finalize(&self) -> SubFeatureStats {
        SubFeatureStats {
            total: self.total,
            length: self.length.finalize(),
            concatenated_length: self.concatenated.finalize(),
        }
    }
}

#[derive(Debug, Default)]
struct TranscriptTypeAcc {
    total: u64,
    length: RunningStats,
    biotypes: BTreeMap<String, u64>,
    exons: SubFeatureAcc,
    cds: SubFeatureAcc,
    all_genes: HashSet<String>,
    genes_by_category: [HashSet<String>; 3],
    has_multiple_exons: bool,
    has_cds: bool,
}

#[derive(Debug, Default)]
struct Accumulator {
    categories: [CategoryAcc; 3],
    transcript_types: HashMap<String, TranscriptTypeAcc>,
}

impl Accumulator {
    fn process_window(&mut self, records: &[GffRecord]) {
        // Pass 1: sub-feature lengths keyed by every Parent identifier.
        let mut parent_subs: HashMap<String, SubLens> = HashMap::new();
        for record in records {
            if !is_sub_feature_type(&record.feature_type) {
                continue;
            }
            let length = record.length();
            for parent in record.parents() {
                let subs = parent_subs.entry(parent.to_string()).or_default();
                match record.feature_type.as_str() {
                    "exon" => subs.exons.push(length),
                    "CDS" => subs.cds.push(length),
                    _ => {}
                }
            }
        }

        // Pass 2: transcripts are the non-region, non-gene, non-sub-feature
        // records whose ID parented something in pass 1.
        let mut transcripts: Vec<TranscriptRec> = Vec::new();
        let mut transcript_ids: HashSet<&str> = HashSet::new();
        for record in records {
            let ftype = record.feature_type.as_str();
            if is_region_type(ftype) || is_gene_type(ftype) || is_sub_feature_type(ftype) {
                continue;
            }
            let Some(id) = record.id() else { continue };
            let Some(subs) = parent_subs.get(id) else {
                continue;
            };
            transcript_ids.insert(id);

            let transcript_type = if is_transcript_type(ftype) {
                ftype.to_string()
            } else {
                DEFAULT_TRANSCRIPT_TYPE.to_string()
            };
            let biotype = record
                .attributes
                .get("biotype")
                .or_else(|| record.attributes.get("transcript_biotype"))
                .cloned();
            let gene = record
                .parents()
                .first()
                .map(|p| p.to_string())
                .or_else(|| record.attributes.get("gene_id").cloned())
                .or_else(|| record.attributes.get("gene").cloned());

            transcripts.push(TranscriptRec {
                transcript_type,
                biotype,
                gene,
                length: record.length(),
                exons: subs.exons.clone(),
                cds: subs.cds.clone(),
            });
        }

        let transcript_genes: HashSet<&str> = transcripts
            .iter()
            .filter_map(|t| t.gene.as_deref())
            .collect();

        // Pass 3: explicit gene-like records, plus implicit genes referenced
        // as the owner of a transcript.
        let mut genes: Vec<GeneRec> = Vec::new();
        for record in records {
            let ftype = record.feature_type.as_str();
            let explicit = is_gene_type(ftype);
            let implicit = !explicit
                && !is_region_type(ftype)
                && !is_sub_feature_type(ftype)
                && record
                    .id()
                    .map(|id| transcript_genes.contains(id) && !transcript_ids.contains(id))
                    .unwrap_or(false);
            if !explicit && !implicit {
                continue;
            }
            genes.push(GeneRec {
                id: record.id().map(String::from),
                feature_type: ftype.to_string(),
                biotype: record
                    .attributes
                    .get("biotype")
                    .or_else(|| record.attributes.get("gene_biotype"))
                    .cloned(),
                length: record.length(),
            });
        }

        self.fold_window(&transcripts, &genes);
    }

    fn fold_window(&mut self, transcripts: &[TranscriptRec], genes: &[GeneRec]) {
        let mut transcripts_by_gene: HashMap<&str, Vec<&TranscriptRec>> = HashMap::new();
        for t in transcripts {
            if let Some(gene) = t.gene.as_deref() {
                transcripts_by_gene.entry(gene).or_default().push(t);
            }
        }

        let mut category_by_gene: HashMap<&str, GeneCategory> = HashMap::new();
        for gene in genes {
            let owned = gene
                .id
                .as_deref()
                .and_then(|id| transcripts_by_gene.get(id))
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let Some(category) = categorize(gene, owned) else {
                continue;
            };
            if let Some(id) = gene.id.as_deref() {
                category_by_gene.insert(id, category);
            }

            let acc = &mut self.categories[category.index()];
            acc.total += 1;
            acc.length.add(gene.length);
            let biotype = gene.biotype.clone().unwrap_or_else(|| BIOTYPE_MISSING.to_string());
            *acc.biotypes.entry(biotype).or_insert(0) += 1;
            for t in owned {
                *acc.transcript_types
                    .entry(t.transcript_type.clone())
                    .or_insert(0) += 1;
            }
        }

        for t in transcripts {
            let acc = self
                .transcript_types
                .entry(t.transcript_type.clone())
                .or_default();
            acc.total += 1;
            acc.length.add(t.length);
            let biotype = t.biotype.clone().unwrap_or_else(|| BIOTYPE_MISSING.to_string());
            *acc.biotypes.entry(biotype).or_insert(0) += 1;

            if !t.exons.is_empty() {
                acc.exons.add_parent(&t.exons);
                acc.has_multiple_exons |= t.exons.len() > 1;
            }
            if !t.cds.is_empty() {
                acc.cds.add_parent(&t.cds);
                acc.has_cds = true;
            }
            if let Some(gene) = t.gene.as_deref() {
                acc.all_genes.insert(gene.to_string());
                if let Some(category) = category_by_gene.get(gene) {
                    acc.genes_by_category[category.index()].insert(gene.to_string());
                }
            }
        }
    }

    fn finalize(self) -> FeatureStatistics {
        let gene_categories = GeneCategory::ALL
            .iter()
            .filter_map(|category| {
                let acc = &self.categories[category.index()];
                if acc.total == 0 {
                    return None;
                }
                Some(GeneCategoryStats {
                    category: *category,
                    total: acc.total,
                    length: acc.length.finalize(),
                    biotypes: acc.biotypes.clone(),
                    transcript_types: acc.transcript_types.clone(),
                })
            })
            .collect();

        let mut transcript_types: Vec<TranscriptTypeStats> = self
            .transcript_types
            .into_iter()
            .map(|(transcript_type, acc)| {
                let by_category = GeneCategory::ALL
                    .iter()
                    .filter(|c| !acc.genes_by_category[c.index()].is_empty())
                    .map(|c| {
                        (
                            c.as_str().to_string(),
                            acc.genes_by_category[c.index()].len() as u64,
                        )
                    })
                    .collect();
                TranscriptTypeStats {
                    transcript_type,
                    total: acc.total,
                    length: acc.length.finalize(),
                    biotypes: acc.biotypes,
                    genes: AssociatedGeneStats {
                        total_unique: acc.all_genes.len() as u64,
                        by_category,
                    },
                    exon_stats: acc.exons.finalize(),
                    cds_stats: if acc.cds.total > 0 {
                        Some(acc.cds.finalize())
                    } else {
                        None
                    },
                    has_multiple_exons: acc.has_multiple_exons,
                    has_cds: acc.has_cds,
                }
            })
            .collect();
        transcript_types.sort_by(|a, b| {
            b.total
                .cmp(&a.total)
                .then_with(|| a.transcript_type.cmp(&b.transcript_type))
        });

        FeatureStatistics {
            gene_categories,
            transcript_types,
        }
    }
}

fn categorize(gene: &GeneRec, transcripts: &[&TranscriptRec]) -> Option<GeneCategory> {
    if gene.feature_type == "pseudogene" {
        return Some(GeneCategory::Pseudogene);
    }
    let has_cds = transcripts.iter().any(|t| !t.cds.is_empty());
    if has_cds || gene.biotype.as_deref() == Some("protein_coding") {
        return Some(GeneCategory::Coding);
    }
    if transcripts.iter().any(|t| !t.exons.is_empty()) {
        return Some(GeneCategory::NonCoding);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const GFF: &str = "\
##gff-version 3
1\tsrc\tchromosome\t1\t100000\t.\t.\t.\tID=chromosome:1
1\tsrc\tgene\t100\t1000\t.\t+\t.\tID=g1;biotype=protein_coding
1\tsrc\tmRNA\t100\t1000\t.\t+\t.\tID=t1;Parent=g1;biotype=protein_coding
1\tsrc\texon\t100\t400\t.\t+\t.\tParent=t1
1\tsrc\texon\t600\t1000\t.\t+\t.\tParent=t1
1\tsrc\tCDS\t150\t400\t.\t+\t0\tParent=t1
1\tsrc\tCDS\t600\t900\t.\t+\t1\tParent=t1
1\tsrc\tncRNA_gene\t2000\t2500\t.\t-\t.\tID=g2;biotype=lncRNA
1\tsrc\tlnc_RNA\t2000\t2500\t.\t-\t.\tID=t2;Parent=g2;biotype=lncRNA
1\tsrc\texon\t2000\t2500\t.\t-\t.\tParent=t2
1\tsrc\tpseudogene\t3000\t3400\t.\t+\t.\tID=g3;biotype=processed_pseudogene
1\tsrc\tpseudogenic_transcript\t3000\t3400\t.\t+\t.\tID=t3;Parent=g3
1\tsrc\texon\t3000\t3400\t.\t+\t.\tParent=t3
";

    fn stats_of(content: &str) -> FeatureStatistics {
        FeatureStatsBuilder::compute(Cursor::new(content)).unwrap()
    }

    #[test]
    fn test_three_categories() {
        let stats = stats_of(GFF);

        let categories: Vec<&str> = stats
            .gene_categories
            .iter()
            .map(|c| c.category.as_str())
            .collect();
        assert_eq!(categories, vec!["coding", "non_coding", "pseudogene"]);

        let coding = &stats.gene_categories[0];
        assert_eq!(coding.total, 1);
        assert_eq!(coding.length.min, 901);
        assert_eq!(coding.biotypes.get("protein_coding"), Some(&1));
        assert_eq!(coding.transcript_types.get("mRNA"), Some(&1));

        let pseudo = &stats.gene_categories[2];
        assert_eq!(pseudo.total, 1);
        assert_eq!(pseudo.biotypes.get("processed_pseudogene"), Some(&1));
    }

    #[test]
    fn test_transcript_type_stats() {
        let stats = stats_of(GFF);
        let mrna = stats
            .transcript_types
            .iter()
            .find(|t| t.transcript_type == "mRNA")
            .unwrap();

        assert_eq!(mrna.total, 1);
        assert_eq!(mrna.exon_stats.total, 2);
        // exon lengths 301 + 401 concatenated
        assert_eq!(mrna.exon_stats.concatenated_length.min, 702);
        assert!(mrna.has_multiple_exons);
        assert!(mrna.has_cds);

        let cds = mrna.cds_stats.as_ref().unwrap();
        assert_eq!(cds.total, 2);
        assert_eq!(cds.concatenated_length.min, 251 + 301);

        assert_eq!(mrna.genes.total_unique, 1);
        assert_eq!(mrna.genes.by_category.get("coding"), Some(&1));

        let lnc = stats
            .transcript_types
            .iter()
            .find(|t| t.transcript_type == "lnc_RNA")
            .unwrap();
        assert!(lnc.cds_stats.is_none());
        assert!(!lnc.has_cds);
        assert_eq!(lnc.genes.by_category.get("non_coding"), Some(&1));
    }

    #[test]
    fn test_implicit_gene_admitted() {
        // provider omits the gene line; the transcript's Parent names an
        // RNA record that is itself parented by nothing
        let gff = "\
1\tsrc\tmiRNA_primary_transcript\t10\t100\t.\t+\t.\tID=mir1
1\tsrc\tmiRNA\t20\t40\t.\t+\t.\tID=t1;Parent=mir1
1\tsrc\texon\t20\t40\t.\t+\t.\tParent=t1
";
        let stats = stats_of(gff);
        // mir1 is admitted as an implicit gene (non_coding via t1's exon)
        assert_eq!(stats.gene_categories.len(), 1);
        assert_eq!(stats.gene_categories[0].category, GeneCategory::NonCoding);
        assert_eq!(stats.gene_categories[0].total, 1);
    }

    #[test]
    fn test_gene_without_evidence_dropped() {
        let gff = "1\tsrc\tgene\t10\t100\t.\t+\t.\tID=g1;biotype=misc\n";
        let stats = stats_of(gff);
        assert!(stats.gene_categories.is_empty());
    }

    #[test]
    fn test_unknown_transcript_type_falls_back() {
        let gff = "\
1\tsrc\tgene\t10\t100\t.\t+\t.\tID=g1
1\tsrc\tweird_RNA_thing\t10\t100\t.\t+\t.\tID=t1;Parent=g1
1\tsrc\texon\t10\t100\t.\t+\t.\tParent=t1
";
        let stats = stats_of(gff);
        assert_eq!(stats.transcript_types.len(), 1);
        assert_eq!(stats.transcript_types[0].transcript_type, "transcript");
    }

    #[test]
    fn test_windowed_matches_single_window() {
        // force one-record windows: flush at every seqid change
        let mut content = String::new();
        for chrom in 1..=4 {
            content.push_str(&format!(
                "{chrom}\tsrc\tgene\t10\t100\t.\t+\t.\tID=g{chrom};biotype=protein_coding\n\
                 {chrom}\tsrc\tmRNA\t10\t100\t.\t+\t.\tID=t{chrom};Parent=g{chrom}\n\
                 {chrom}\tsrc\tCDS\t10\t50\t.\t+\t0\tParent=t{chrom}\n"
            ));
        }

        let whole = FeatureStatsBuilder::compute(Cursor::new(&content)).unwrap();
        let mut windowed = FeatureStatsBuilder::with_threshold(1);
        for line in content.lines() {
            windowed.push_line(line).unwrap();
        }
        assert_eq!(whole, windowed.finish());
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(stats_of(GFF), stats_of(GFF));
    }

    #[test]
    fn test_single_record_per_seqid() {
        // every seqid has exactly one record; all passes must still run
        let gff = "\
1\tsrc\tgene\t10\t100\t.\t+\t.\tID=g1
2\tsrc\tgene\t10\t100\t.\t+\t.\tID=g2
3\tsrc\tgene\t10\t100\t.\t+\t.\tID=g3
";
        let stats = stats_of(gff);
        // genes with no transcripts and no protein_coding biotype drop out
        assert!(stats.gene_categories.is_empty());
        assert!(stats.transcript_types.is_empty());
    }
}
