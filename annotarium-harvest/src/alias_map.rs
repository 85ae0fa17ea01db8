//! Alias mapper: resolve GFF contig names to assembly chromosomes

use annotarium_bio::alias::{coerce_numeric, normalize_chr_token};
use annotarium_core::AnnotariumResult;
use annotarium_store::{AnnotationSequenceMap, Filter, GenomicSequence, MetadataStore};
use std::collections::HashMap;
use tracing::debug;

/// Flat alias -> chromosome lookup for one assembly, built from the
/// precomputed alias sets of its stored sequences.
pub struct AliasMap {
    by_alias: HashMap<String, GenomicSequence>,
}

impl AliasMap {
    pub fn load(store: &MetadataStore, assembly_accession: &str) -> AnnotariumResult<Self> {
        let sequences: Vec<GenomicSequence> = store.find(
            &Filter::eq("assembly_accession", assembly_accession),
            &Default::default(),
        )?;
        let mut by_alias = HashMap::new();
        for sequence in sequences {
            for alias in &sequence.aliases {
                by_alias
                    .entry(alias.clone())
                    .or_insert_with(|| sequence.clone());
            }
        }
        Ok(Self { by_alias })
    }

    /// Resolution order: exact alias, numeric coercion, `chr…`
    /// normalization. Unresolvable contigs are not errors.
    pub fn resolve(&self, contig: &str) -> Option<&GenomicSequence> {
        if let Some(sequence) = self.by_alias.get(contig) {
            return Some(sequence);
        }
        if let Some(numeric) = coerce_numeric(contig) {
            if let Some(sequence) = self.by_alias.get(&numeric) {
                return Some(sequence);
            }
        }
        if let Some(normalized) = normalize_chr_token(contig) {
            if let Some(sequence) = self.by_alias.get(&normalized) {
                return Some(sequence);
            }
        }
        None
    }

    /// Map every contig of an annotation. Returns the sequence-map rows and
    /// the resolved contig names (the annotation's `mapped_regions`).
    pub fn map_contigs(
        &self,
        annotation_id: &str,
        contigs: &[String],
    ) -> (Vec<AnnotationSequenceMap>, Vec<String>) {
        let mut rows = Vec::new();
        let mut mapped = Vec::new();
        for contig in contigs {
            match self.resolve(contig) {
                Some(sequence) => {
                    rows.push(AnnotationSequenceMap {
                        annotation_id: annotation_id.to_string(),
                        sequence_id: contig.clone(),
                        aliases: sequence.aliases.clone(),
                    });
                    mapped.push(contig.clone());
                }
                None => {
                    debug!(contig, "contig resolved to no chromosome");
                }
            }
        }
        (rows, mapped)
    }
}
