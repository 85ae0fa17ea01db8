//! RocksDB backend: column families, options, open/close

use annotarium_core::{AnnotariumError, AnnotariumResult};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBCompressionType, DBWithThreadMode, MultiThreaded,
    Options,
};
use std::path::Path;
use std::sync::Arc;

/// Column family names for the stored collections
pub mod cf_names {
    pub const ANNOTATIONS: &str = "annotations";
    pub const ASSEMBLIES: &str = "assemblies";
    pub const ORGANISMS: &str = "organisms";
    pub const TAXA: &str = "taxa";
    pub const SEQUENCES: &str = "sequences";
    pub const SEQUENCE_MAPS: &str = "sequence_maps";
    pub const ERRORS: &str = "annotation_errors";
    /// Unique-index entries: `collection/field\0value` -> document id
    pub const UNIQ: &str = "uniq";

    pub const ALL: &[&str] = &[
        ANNOTATIONS,
        ASSEMBLIES,
        ORGANISMS,
        TAXA,
        SEQUENCES,
        SEQUENCE_MAPS,
        ERRORS,
        UNIQ,
    ];
}

pub type Db = DBWithThreadMode<MultiThreaded>;

/// Thin wrapper owning the RocksDB handle.
pub struct Backend {
    pub db: Arc<Db>,
}

impl Backend {
    pub fn open(path: &Path) -> AnnotariumResult<Self> {
        std::fs::create_dir_all(path)?;

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = cf_names::ALL
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(DBCompressionType::Zstd);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_compression_type(DBCompressionType::Zstd);

        let db = Db::open_cf_descriptors(&db_opts, path, cf_descriptors).map_err(|e| {
            AnnotariumError::Store(format!("cannot open store at {}: {}", path.display(), e))
        })?;

        Ok(Self { db: Arc::new(db) })
    }

    pub fn cf_handle(&self, name: &str) -> AnnotariumResult<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| AnnotariumError::Store(format!("missing column family: {name}")))
    }
}

/// Key of a unique-index entry in the `uniq` column family.
pub fn uniq_key(collection: &str, field: &str, value: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(collection.len() + field.len() + value.len() + 2);
    key.extend_from_slice(collection.as_bytes());
    key.push(b'/');
    key.extend_from_slice(field.as_bytes());
    key.push(0);
    key.extend_from_slice(value.as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_column_families() {
        let dir = TempDir::new().unwrap();
        let backend = Backend::open(dir.path()).unwrap();
        for name in cf_names::ALL {
            assert!(backend.cf_handle(name).is_ok(), "missing {name}");
        }
    }

    #[test]
    fn test_uniq_key_layout() {
        let key = uniq_key("annotations", "url_path", "https://x/y.gff.gz");
        let text = String::from_utf8_lossy(&key);
        assert!(text.starts_with("annotations/url_path\0"));
        assert!(text.ends_with("y.gff.gz"));
    }
}
