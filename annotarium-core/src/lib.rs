//! Core utilities and types shared across all Annotarium crates

pub mod config;
pub mod error;
pub mod rate_limit;
pub mod system;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{AnnotariumError, AnnotariumResult};
pub use rate_limit::RateLimiter;
pub use types::{AnnotationId, AssemblyAccession, Md5Digest, TaxonId};

/// Version information for the Annotarium project
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
