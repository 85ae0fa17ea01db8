//! NCBI-datasets-style taxonomy source (JSON)

use super::{LineageEntry, LineageSource};
use crate::fetch::fetch_text;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

pub struct NcbiTaxonomySource {
    base_url: String,
}

impl NcbiTaxonomySource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TaxonomyResponse {
    #[serde(default)]
    taxonomy_nodes: Vec<TaxonomyNodeWrapper>,
}

#[derive(Debug, Deserialize)]
struct TaxonomyNodeWrapper {
    taxonomy: Option<TaxonomyNode>,
}

#[derive(Debug, Deserialize)]
struct TaxonomyNode {
    tax_id: u32,
    organism_name: Option<String>,
    rank: Option<String>,
    /// Ancestor taxids, root first
    #[serde(default)]
    lineage: Vec<u32>,
}

#[async_trait]
impl LineageSource for NcbiTaxonomySource {
    fn name(&self) -> &'static str {
        "ncbi-datasets"
    }

    async fn lineage(
        &self,
        client: &reqwest::Client,
        taxid: u32,
    ) -> Result<Vec<LineageEntry>> {
        // first call: the taxon itself plus its ancestor id list
        let url = format!("{}/taxonomy/taxon/{}", self.base_url, taxid);
        let body = fetch_text(client, &url).await?;
        let response: TaxonomyResponse =
            serde_json::from_str(&body).context("invalid taxonomy response")?;
        let node = response
            .taxonomy_nodes
            .into_iter()
            .filter_map(|w| w.taxonomy)
            .find(|n| n.tax_id == taxid)
            .context("taxid missing from taxonomy response")?;

        let ancestors: Vec<u32> = node.lineage.iter().copied().filter(|&id| id > 1).collect();
        if ancestors.is_empty() {
            return Ok(vec![entry_of(&node)]);
        }

        // second call: names and ranks for every ancestor at once
        let joined = ancestors
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}/taxonomy/taxon/{}", self.base_url, joined);
        let body = fetch_text(client, &url).await?;
        let response: TaxonomyResponse =
            serde_json::from_str(&body).context("invalid ancestor taxonomy response")?;
        let mut by_id = std::collections::HashMap::new();
        for ancestor in response.taxonomy_nodes.into_iter().filter_map(|w| w.taxonomy) {
            by_id.insert(ancestor.tax_id, ancestor);
        }

        let mut chain: Vec<LineageEntry> = ancestors
            .iter()
            .filter_map(|id| by_id.get(id).map(entry_of))
            .collect();
        chain.push(entry_of(&node));
        Ok(chain)
    }
}

fn entry_of(node: &TaxonomyNode) -> LineageEntry {
    LineageEntry {
        taxid: node.tax_id,
        scientific_name: node
            .organism_name
            .clone()
            .unwrap_or_else(|| format!("taxon {}", node.tax_id)),
        rank: node.rank.as_ref().map(|r| r.to_lowercase()),
    }
}
