//! The Annotarium ingestion pipeline
//!
//! Turns raw remote catalog rows into durable, indexed, enriched annotation
//! records: discovery, admission, taxonomy and assembly enrichment,
//! download / sort / bgzip / index / checksum, alias mapping, feature
//! summaries and statistics, atomic publication, and derived-count
//! maintenance. One orchestrator run at a time; per-candidate failures
//! never escape the candidate.

pub mod admission;
pub mod alias_map;
pub mod assembly;
pub mod catalog;
pub mod counts;
pub mod fetch;
pub mod orchestrator;
pub mod processor;
pub mod scheduler;
pub mod taxonomy;

pub use catalog::Candidate;
pub use orchestrator::{IngestReport, Orchestrator};
pub use scheduler::Scheduler;
