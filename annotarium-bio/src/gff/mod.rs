//! GFF file handling: records, streaming sort, bgzip + CSI, region reads

pub mod bgzip;
pub mod record;
pub mod region;
pub mod sort;

pub use bgzip::{compress_and_index, CompressOutcome};
pub use record::GffRecord;
pub use region::IndexedGff;
pub use sort::{sort_gff, SortOutcome};
