//! RocksDB-backed document store for Annotarium metadata
//!
//! One column family per collection, JSON documents, explicit unique-index
//! entries in a shared `uniq` column family. Batch inserts are
//! all-or-nothing; mutation runs under a single write lock while readers go
//! straight to RocksDB and only ever observe committed batches.

pub mod backend;
pub mod document;
pub mod filter;
pub mod models;
pub mod store;

pub use document::Document;
pub use filter::{Filter, FindOptions};
pub use models::{
    Annotation, AnnotationError, AnnotationSequenceMap, AssemblyStats, GenomeAssembly,
    GenomicSequence, IndexedFileInfo, Organism, SourceFileInfo, TaxonNode,
};
pub use store::{MetadataStore, Modify};
