//! Taxonomy resolver: lineage lookup through a chain of external sources
//!
//! For each unknown taxid the resolver consults NCBI-datasets JSON, then the
//! ENA browser XML service, then the ENA portal JSON service, stopping at
//! the first source that yields a lineage. Failures are soft: an unresolved
//! taxid drops its candidates from the run, nothing else.

pub mod ena;
pub mod ncbi;

use annotarium_core::{AnnotariumResult, RateLimiter};
use annotarium_store::{MetadataStore, Modify, Organism, TaxonNode};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// One taxon in a lineage, ordered root -> leaf by the sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageEntry {
    pub taxid: u32,
    pub scientific_name: String,
    pub rank: Option<String>,
}

/// A remote service able to produce the full lineage of a taxid.
#[async_trait]
pub trait LineageSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lineage ordered root -> leaf, universal root (taxid 1) excluded,
    /// leaf included.
    async fn lineage(
        &self,
        client: &reqwest::Client,
        taxid: u32,
    ) -> anyhow::Result<Vec<LineageEntry>>;
}

pub struct TaxonomyResolver {
    sources: Vec<Box<dyn LineageSource>>,
}

impl TaxonomyResolver {
    pub fn new(sources: Vec<Box<dyn LineageSource>>) -> Self {
        Self { sources }
    }

    /// Resolve every distinct taxid of a batch. Persists new taxon nodes,
    /// links parent -> child sets, and upserts organisms. Returns
    /// `taxid -> lineage` (species -> root order) for the taxids that
    /// resolved; the rest are simply absent.
    pub async fn resolve_batch(
        &self,
        store: &MetadataStore,
        client: &reqwest::Client,
        rate: &mut RateLimiter,
        taxids: &[(u32, String)],
    ) -> AnnotariumResult<HashMap<u32, Vec<u32>>> {
        let mut resolved: HashMap<u32, Vec<u32>> = HashMap::new();

        for (taxid, organism_name) in dedup(taxids) {
            if resolved.contains_key(&taxid) {
                continue;
            }
            // a previously persisted organism already carries its lineage
            if let Some(organism) = store.get::<Organism>(&taxid.to_string())? {
                resolved.insert(taxid, organism.taxon_lineage);
                continue;
            }

            let Some(chain) = self.fetch_lineage(client, rate, taxid).await else {
                warn!(taxid, "no taxonomy source resolved this taxid; dropping");
                continue;
            };

            self.persist_chain(store, &chain)?;
            let lineage = species_to_root(&chain);
            self.persist_organism(store, taxid, &organism_name, &lineage)?;
            resolved.insert(taxid, lineage);
        }

        info!(
            resolved = resolved.len(),
            requested = taxids.len(),
            "taxonomy batch resolved"
        );
        Ok(resolved)
    }

    /// First source that yields a non-empty lineage wins.
    async fn fetch_lineage(
        &self,
        client: &reqwest::Client,
        rate: &mut RateLimiter,
        taxid: u32,
    ) -> Option<Vec<LineageEntry>> {
        for source in &self.sources {
            rate.tick().await;
            match source.lineage(client, taxid).await {
                Ok(chain) if !chain.is_empty() => {
                    debug!(taxid, source = source.name(), "lineage resolved");
                    return Some(chain);
                }
                Ok(_) => {
                    debug!(taxid, source = source.name(), "source returned empty lineage");
                }
                Err(e) => {
                    debug!(taxid, source = source.name(), error = %e, "source failed");
                }
            }
        }
        None
    }

    /// Insert unseen taxon nodes, then add each node to its parent's child
    /// set (idempotent set-add).
    fn persist_chain(&self, store: &MetadataStore, chain: &[LineageEntry]) -> AnnotariumResult<()> {
        let mut new_nodes = Vec::new();
        for entry in chain {
            if store.get::<TaxonNode>(&entry.taxid.to_string())?.is_none() {
                new_nodes.push(TaxonNode {
                    taxid: entry.taxid,
                    scientific_name: entry.scientific_name.clone(),
                    rank: entry.rank.clone(),
                    children: Default::default(),
                    annotations_count: 0,
                    assemblies_count: 0,
                    organisms_count: 0,
                });
            }
        }
        store.insert_many(&new_nodes)?;

        for pair in chain.windows(2) {
            store.modify::<TaxonNode>(
                &pair[0].taxid.to_string(),
                &[Modify::AddToSet("children".to_string(), json!(pair[1].taxid))],
            )?;
        }
        Ok(())
    }

    fn persist_organism(
        &self,
        store: &MetadataStore,
        taxid: u32,
        organism_name: &str,
        lineage: &[u32],
    ) -> AnnotariumResult<()> {
        store.upsert(&Organism {
            taxid,
            organism_name: organism_name.to_string(),
            common_name: None,
            taxon_lineage: lineage.to_vec(),
            annotations_count: 0,
            assemblies_count: 0,
        })
    }
}

/// Reverse a root -> leaf chain into the stored species -> root order.
fn species_to_root(chain: &[LineageEntry]) -> Vec<u32> {
    chain.iter().rev().map(|e| e.taxid).collect()
}

fn dedup(taxids: &[(u32, String)]) -> Vec<(u32, String)> {
    let mut seen = std::collections::HashSet::new();
    taxids
        .iter()
        .filter(|(taxid, _)| seen.insert(*taxid))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_species_to_root() {
        let chain = vec![
            LineageEntry {
                taxid: 2759,
                scientific_name: "Eukaryota".into(),
                rank: Some("superkingdom".into()),
            },
            LineageEntry {
                taxid: 9605,
                scientific_name: "Homo".into(),
                rank: Some("genus".into()),
            },
            LineageEntry {
                taxid: 9606,
                scientific_name: "Homo sapiens".into(),
                rank: Some("species".into()),
            },
        ];
        assert_eq!(species_to_root(&chain), vec![9606, 9605, 2759]);
    }

    #[test]
    fn test_dedup_keeps_first() {
        let input = vec![
            (9606, "Homo sapiens".to_string()),
            (9606, "duplicate".to_string()),
            (10090, "Mus musculus".to_string()),
        ];
        let out = dedup(&input);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].1, "Homo sapiens");
    }
}
