//! Document contract for stored collections

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A persisted entity: knows its collection, primary key, and the fields
/// the store must keep unique across the collection.
pub trait Document: Serialize + DeserializeOwned {
    const COLLECTION: &'static str;

    /// Primary key within the collection.
    fn id(&self) -> String;

    /// `(field, value)` pairs enforced unique by the store, beyond the
    /// primary key itself.
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}
