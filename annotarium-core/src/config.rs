//! Configuration types for Annotarium
//!
//! Every field can be set from a TOML file, and the operational knobs are
//! overridable through `ANNOTARIUM_*` environment variables so container
//! deployments need no config file at all.

use crate::AnnotariumError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for durable annotation artifacts (bgzipped GFF + CSI)
    #[serde(default = "default_annotations_root")]
    pub annotations_root: PathBuf,
    /// RocksDB metadata store directory
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Scratch directory for in-flight downloads
    #[serde(default = "default_downloads_cache_dir")]
    pub downloads_cache_dir: PathBuf,
    /// Downloads-cache sweep TTL in seconds
    #[serde(default = "default_downloads_cache_ttl_secs")]
    pub downloads_cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Shared secret for admin-gated endpoints; admin routes reject
    /// everything when unset
    #[serde(default)]
    pub admin_auth_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Remote annotation catalog TSV URLs, consulted in order
    #[serde(default)]
    pub catalog_urls: Vec<String>,
    /// Candidates processed per pipeline batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Bounded fan-out for assembly report fetches
    #[serde(default = "default_report_concurrency")]
    pub report_concurrency: usize,
    /// Rate limit for serial external calls: after `calls`, sleep `pause_secs`
    #[serde(default = "default_rate_limit_calls")]
    pub rate_limit_calls: u32,
    #[serde(default = "default_rate_limit_pause_secs")]
    pub rate_limit_pause_secs: u64,
    /// Timeout applied to every external HTTP call, in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// NCBI-datasets-style taxonomy/assembly JSON service
    #[serde(default = "default_ncbi_base")]
    pub ncbi_base: String,
    /// ENA browser XML service
    #[serde(default = "default_ena_browser_base")]
    pub ena_browser_base: String,
    /// ENA portal JSON service
    #[serde(default = "default_ena_portal_base")]
    pub ena_portal_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Day of week for the weekly ingestion run
    #[serde(default = "default_ingest_weekday")]
    pub ingest_weekday: String,
    /// Hour of day (UTC, 0-23) for the weekly ingestion run
    #[serde(default = "default_ingest_hour")]
    pub ingest_hour: u32,
}

// Default value functions
fn default_annotations_root() -> PathBuf {
    PathBuf::from("data/annotations")
}
fn default_store_path() -> PathBuf {
    PathBuf::from("data/store")
}
fn default_downloads_cache_dir() -> PathBuf {
    PathBuf::from("data/downloads-cache")
}
fn default_downloads_cache_ttl_secs() -> u64 {
    3600
}
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_batch_size() -> usize {
    10
}
fn default_report_concurrency() -> usize {
    20
}
fn default_rate_limit_calls() -> u32 {
    50
}
fn default_rate_limit_pause_secs() -> u64 {
    2
}
fn default_http_timeout_secs() -> u64 {
    60
}
fn default_ncbi_base() -> String {
    "https://api.ncbi.nlm.nih.gov/datasets/v2".to_string()
}
fn default_ena_browser_base() -> String {
    "https://www.ebi.ac.uk/ena/browser/api".to_string()
}
fn default_ena_portal_base() -> String {
    "https://www.ebi.ac.uk/ena/portal/api".to_string()
}
fn default_ingest_weekday() -> String {
    "sunday".to_string()
}
fn default_ingest_hour() -> u32 {
    2
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            annotations_root: default_annotations_root(),
            store_path: default_store_path(),
            downloads_cache_dir: default_downloads_cache_dir(),
            downloads_cache_ttl_secs: default_downloads_cache_ttl_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            admin_auth_key: None,
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            catalog_urls: Vec::new(),
            batch_size: default_batch_size(),
            report_concurrency: default_report_concurrency(),
            rate_limit_calls: default_rate_limit_calls(),
            rate_limit_pause_secs: default_rate_limit_pause_secs(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            ncbi_base: default_ncbi_base(),
            ena_browser_base: default_ena_browser_base(),
            ena_portal_base: default_ena_portal_base(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            ingest_weekday: default_ingest_weekday(),
            ingest_hour: default_ingest_hour(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, AnnotariumError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AnnotariumError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config: Config = toml::from_str(&raw)
            .map_err(|e| AnnotariumError::Configuration(format!("invalid config: {}", e)))?;
        config.apply_env();
        Ok(config)
    }

    /// Build configuration from defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(root) = std::env::var("ANNOTARIUM_ROOT") {
            self.storage.annotations_root = PathBuf::from(root);
        }
        if let Ok(path) = std::env::var("ANNOTARIUM_STORE") {
            self.storage.store_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("ANNOTARIUM_DOWNLOADS_CACHE") {
            self.storage.downloads_cache_dir = PathBuf::from(dir);
        }
        if let Ok(ttl) = std::env::var("ANNOTARIUM_DOWNLOADS_CACHE_TTL") {
            if let Ok(secs) = ttl.parse() {
                self.storage.downloads_cache_ttl_secs = secs;
            }
        }
        if let Ok(addr) = std::env::var("ANNOTARIUM_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Ok(key) = std::env::var("ANNOTARIUM_AUTH_KEY") {
            self.server.admin_auth_key = Some(key);
        }
        if let Ok(urls) = std::env::var("ANNOTARIUM_CATALOG_URLS") {
            self.ingestion.catalog_urls = urls
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
    }

    /// Validate the parts that ingestion cannot run without.
    pub fn validate_for_ingestion(&self) -> Result<(), AnnotariumError> {
        if self.ingestion.catalog_urls.is_empty() {
            return Err(AnnotariumError::Configuration(
                "no catalog URLs configured".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.ingestion.batch_size, 10);
        assert_eq!(config.ingestion.report_concurrency, 20);
        assert_eq!(config.storage.downloads_cache_ttl_secs, 3600);
        assert!(config.server.admin_auth_key.is_none());
        assert_eq!(config.schedule.ingest_weekday, "sunday");
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [ingestion]
            catalog_urls = ["https://example.org/catalog.tsv"]
            batch_size = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.ingestion.batch_size, 5);
        assert_eq!(config.ingestion.catalog_urls.len(), 1);
        // untouched sections keep their defaults
        assert_eq!(config.ingestion.report_concurrency, 20);
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("ANNOTARIUM_ROOT", "/srv/annotations");
        std::env::set_var("ANNOTARIUM_CATALOG_URLS", "https://a/x.tsv, https://b/y.tsv");

        let config = Config::from_env();
        assert_eq!(
            config.storage.annotations_root,
            PathBuf::from("/srv/annotations")
        );
        assert_eq!(config.ingestion.catalog_urls.len(), 2);

        std::env::remove_var("ANNOTARIUM_ROOT");
        std::env::remove_var("ANNOTARIUM_CATALOG_URLS");
    }

    #[test]
    #[serial]
    fn test_validate_for_ingestion() {
        let config = Config::default();
        assert!(config.validate_for_ingestion().is_err());
    }
}
