//! Derived-count maintenance and orphan reaping
//!
//! Counts are recomputed from the store, never maintained as deltas.
//! Entities whose counts recompute to zero are deleted; that is how orphans
//! from deleted-then-not-republished sources get reaped.

use annotarium_core::AnnotariumResult;
use annotarium_store::{
    Annotation, Filter, GenomeAssembly, GenomicSequence, MetadataStore, Modify, Organism,
    TaxonNode,
};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

pub struct DerivedCountsMaintainer<'a> {
    store: &'a MetadataStore,
}

impl<'a> DerivedCountsMaintainer<'a> {
    pub fn new(store: &'a MetadataStore) -> Self {
        Self { store }
    }

    /// Recompute counts for the entities affected by newly saved
    /// annotations.
    pub fn update_for(&self, saved: &[Annotation]) -> AnnotariumResult<()> {
        let mut accessions: BTreeSet<String> = BTreeSet::new();
        let mut taxids: BTreeSet<u32> = BTreeSet::new();
        let mut lineage_taxids: BTreeSet<u32> = BTreeSet::new();
        for annotation in saved {
            accessions.insert(annotation.assembly_accession.clone());
            taxids.insert(annotation.taxid);
            lineage_taxids.extend(annotation.taxon_lineage.iter().copied());
            lineage_taxids.insert(annotation.taxid);
        }
        self.recompute(&accessions, &taxids, &lineage_taxids)
    }

    /// Recompute counts for every stored entity and reap zero-count orphans.
    pub fn sweep_all(&self) -> AnnotariumResult<()> {
        let accessions: BTreeSet<String> = self
            .store
            .project_field::<GenomeAssembly>(&Filter::All, "assembly_accession")?
            .into_iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect();
        let taxids: BTreeSet<u32> = self
            .store
            .project_field::<Organism>(&Filter::All, "taxid")?
            .into_iter()
            .filter_map(|v| v.as_u64().map(|t| t as u32))
            .collect();
        let lineage_taxids: BTreeSet<u32> = self
            .store
            .project_field::<TaxonNode>(&Filter::All, "taxid")?
            .into_iter()
            .filter_map(|v| v.as_u64().map(|t| t as u32))
            .collect();
        self.recompute(&accessions, &taxids, &lineage_taxids)
    }

    /// Entities are recomputed bottom-up (assemblies, then organisms, then
    /// taxa), and every aggregate is taken after the level below it has been
    /// reaped, so one pass converges.
    fn recompute(
        &self,
        accessions: &BTreeSet<String>,
        taxids: &BTreeSet<u32>,
        lineage_taxids: &BTreeSet<u32>,
    ) -> AnnotariumResult<()> {
        let annotations_by_assembly = self
            .store
            .count_by::<Annotation>(&Filter::All, "assembly_accession")?;

        for accession in accessions {
            let count = annotations_by_assembly.get(accession).copied().unwrap_or(0);
            if count == 0 {
                debug!(accession, "reaping assembly with no annotations");
                self.store
                    .delete_where::<GenomicSequence>(&Filter::eq(
                        "assembly_accession",
                        accession.as_str(),
                    ))?;
                self.store.delete::<GenomeAssembly>(accession)?;
            } else if self.store.get::<GenomeAssembly>(accession)?.is_some() {
                self.store.modify::<GenomeAssembly>(
                    accession,
                    &[Modify::Set("annotations_count".into(), json!(count))],
                )?;
            }
        }

        let annotations_by_taxid = self.store.count_by::<Annotation>(&Filter::All, "taxid")?;
        let assemblies_by_taxid = self.store.count_by::<GenomeAssembly>(&Filter::All, "taxid")?;

        for taxid in taxids {
            let key = taxid.to_string();
            let annotations = annotations_by_taxid.get(&key).copied().unwrap_or(0);
            let assemblies = assemblies_by_taxid.get(&key).copied().unwrap_or(0);
            if annotations == 0 && assemblies == 0 {
                debug!(taxid, "reaping organism with no annotations or assemblies");
                self.store.delete::<Organism>(&key)?;
            } else if self.store.get::<Organism>(&key)?.is_some() {
                self.store.modify::<Organism>(
                    &key,
                    &[
                        Modify::Set("annotations_count".into(), json!(annotations)),
                        Modify::Set("assemblies_count".into(), json!(assemblies)),
                    ],
                )?;
            }
        }

        let annotation_lineages = self.lineage_membership::<Annotation>()?;
        let assembly_lineages = self.lineage_membership::<GenomeAssembly>()?;
        let organism_lineages = self.lineage_membership::<Organism>()?;

        for taxid in lineage_taxids {
            let key = taxid.to_string();
            let annotations = annotation_lineages.get(taxid).copied().unwrap_or(0);
            let assemblies = assembly_lineages.get(taxid).copied().unwrap_or(0);
            let organisms = organism_lineages.get(taxid).copied().unwrap_or(0);
            if annotations == 0 && assemblies == 0 && organisms == 0 {
                debug!(taxid, "reaping taxon with no descendants");
                self.store.delete::<TaxonNode>(&key)?;
            } else if self.store.get::<TaxonNode>(&key)?.is_some() {
                self.store.modify::<TaxonNode>(
                    &key,
                    &[
                        Modify::Set("annotations_count".into(), json!(annotations)),
                        Modify::Set("assemblies_count".into(), json!(assemblies)),
                        Modify::Set("organisms_count".into(), json!(organisms)),
                    ],
                )?;
            }
        }

        info!(
            assemblies = accessions.len(),
            organisms = taxids.len(),
            taxa = lineage_taxids.len(),
            "derived counts recomputed"
        );
        Ok(())
    }

    /// For every taxid, how many documents of `T` carry it in their
    /// `taxon_lineage` (or as their own `taxid`).
    fn lineage_membership<T: annotarium_store::Document>(
        &self,
    ) -> AnnotariumResult<HashMap<u32, u64>> {
        let rows = self
            .store
            .project_fields::<T>(&Filter::All, &["taxid", "taxon_lineage"])?;
        let mut membership: HashMap<u32, u64> = HashMap::new();
        for row in rows {
            let mut seen: BTreeSet<u32> = BTreeSet::new();
            if let Some(taxid) = row[0].as_u64() {
                seen.insert(taxid as u32);
            }
            if let Some(lineage) = row[1].as_array() {
                seen.extend(lineage.iter().filter_map(|v| v.as_u64()).map(|t| t as u32));
            }
            for taxid in seen {
                *membership.entry(taxid).or_insert(0) += 1;
            }
        }
        Ok(membership)
    }
}
