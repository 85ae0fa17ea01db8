//! GFF-domain code for Annotarium: parsing, sorting, block compression,
//! coordinate indexing, region reads, feature summaries and statistics,
//! and chromosome alias handling.

pub mod alias;
pub mod gff;
pub mod stats;
pub mod summary;

pub use gff::record::GffRecord;
pub use gff::region::IndexedGff;
pub use stats::FeatureStatistics;
pub use summary::FeatureOverview;
