//! Admission filter: drop candidates already processed or previously failed
//!
//! A candidate is re-admitted only if its URL or declared MD5 changed, and
//! never while an error row for the same declared MD5 remains.

use crate::catalog::Candidate;
use annotarium_core::AnnotariumResult;
use annotarium_store::{Annotation, AnnotationError, MetadataStore};
use tracing::debug;

pub fn filter_candidates(
    store: &MetadataStore,
    candidates: Vec<Candidate>,
) -> AnnotariumResult<Vec<Candidate>> {
    let mut admitted = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if is_already_processed(store, &candidate)? {
            debug!(url = candidate.access_url, "candidate already processed");
            continue;
        }
        if store
            .get::<AnnotationError>(&candidate.md5_checksum)?
            .is_some()
        {
            debug!(
                url = candidate.access_url,
                md5 = candidate.md5_checksum,
                "candidate previously errored; suppressed until the error row is cleared"
            );
            continue;
        }
        admitted.push(candidate);
    }
    Ok(admitted)
}

fn is_already_processed(store: &MetadataStore, candidate: &Candidate) -> AnnotariumResult<bool> {
    let existing = store.find_by_unique::<Annotation>("url_path", &candidate.access_url)?;
    Ok(existing.is_some_and(|a| a.source_file_info.uncompressed_md5 == candidate.md5_checksum))
}
