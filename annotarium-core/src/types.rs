//! Shared identifier types used throughout Annotarium

use serde::{Deserialize, Serialize};
use std::fmt;

/// Taxonomy ID type - newtype pattern for type safety
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct TaxonId(pub u32);

impl TaxonId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Check if this is the universal root taxon (1)
    pub fn is_root(&self) -> bool {
        self.0 == 1
    }
}

impl fmt::Display for TaxonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TaxonId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<TaxonId> for u32 {
    fn from(taxon: TaxonId) -> Self {
        taxon.0
    }
}

// Common taxonomy constants
impl TaxonId {
    pub const ROOT: Self = Self(1);
    pub const BACTERIA: Self = Self(2);
    pub const EUKARYOTA: Self = Self(2759);
    pub const HUMAN: Self = Self(9606);
    pub const MOUSE: Self = Self(10090);
}

/// Hex MD5 digest, lower-case, 32 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Md5Digest(String);

impl Md5Digest {
    /// Wrap an already-computed hex digest, normalizing case.
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into().to_lowercase())
    }

    /// Digest of a complete in-memory buffer.
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(format!("{:x}", md5::compute(data)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Md5Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<md5::Digest> for Md5Digest {
    fn from(digest: md5::Digest) -> Self {
        Self(format!("{:x}", digest))
    }
}

/// Primary key of an annotation: hex MD5 of its sorted uncompressed GFF bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnotationId(pub String);

impl AnnotationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Md5Digest> for AnnotationId {
    fn from(digest: Md5Digest) -> Self {
        Self(digest.as_str().to_string())
    }
}

/// Assembly accession, e.g. `GCA_000001405.15`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssemblyAccession(pub String);

impl AssemblyAccession {
    pub fn new(accession: impl Into<String>) -> Self {
        Self(accession.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Accession without the trailing `.N` version suffix, if any.
    pub fn unversioned(&self) -> &str {
        match self.0.rsplit_once('.') {
            Some((base, version)) if version.chars().all(|c| c.is_ascii_digit()) => base,
            _ => &self.0,
        }
    }
}

impl fmt::Display for AssemblyAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
