//! Pagination and list-filter query parameters

use annotarium_store::{Filter, FindOptions};
use serde::Deserialize;
use serde_json::json;

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 1000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort_by: Option<String>,
    /// `asc` (default) or `desc`
    pub order: Option<String>,
    pub taxid: Option<u32>,
    pub assembly_accession: Option<String>,
    pub source_db: Option<String>,
    /// `json` (default) or `tsv` where supported
    pub format: Option<String>,
}

impl ListParams {
    pub fn find_options(&self) -> FindOptions {
        FindOptions {
            sort_by: self.sort_by.clone(),
            descending: self.order.as_deref() == Some("desc"),
            skip: self.offset.unwrap_or(0),
            limit: Some(self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)),
        }
    }

    /// Entity filter from the common list parameters; `source_db` only
    /// applies to annotations, where it lives under `source_file_info`.
    pub fn filter(&self, source_db_field: Option<&str>) -> Filter {
        let mut clauses = Vec::new();
        if let Some(taxid) = self.taxid {
            clauses.push(Filter::Eq("taxid".to_string(), json!(taxid)));
        }
        if let Some(accession) = &self.assembly_accession {
            clauses.push(Filter::Eq(
                "assembly_accession".to_string(),
                json!(accession),
            ));
        }
        if let (Some(field), Some(source_db)) = (source_db_field, &self.source_db) {
            clauses.push(Filter::Eq(field.to_string(), json!(source_db)));
        }
        match clauses.len() {
            0 => Filter::All,
            1 => clauses.pop().expect("one clause"),
            _ => Filter::And(clauses),
        }
    }

    pub fn wants_tsv(&self) -> bool {
        self.format.as_deref() == Some("tsv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let params = ListParams::default();
        let options = params.find_options();
        assert_eq!(options.limit, Some(DEFAULT_LIMIT));
        assert_eq!(options.skip, 0);
        assert!(!options.descending);
    }

    #[test]
    fn test_limit_clamped() {
        let params = ListParams {
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(params.find_options().limit, Some(MAX_LIMIT));
    }

    #[test]
    fn test_filter_composition() {
        let params = ListParams {
            taxid: Some(9606),
            assembly_accession: Some("GCA_1".to_string()),
            ..Default::default()
        };
        let filter = params.filter(None);
        assert!(matches!(filter, Filter::And(ref clauses) if clauses.len() == 2));
    }
}
