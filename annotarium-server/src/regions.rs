//! Region streaming service
//!
//! Resolves a user-supplied region alias to the physical seqid inside one
//! annotation's GFF and streams the matching lines through the
//! block-compressed index. Lines cross a bounded channel into the response
//! body, so a disconnected client stops the file iteration promptly.

use crate::errors::{ApiError, ApiResult};
use crate::AppState;
use annotarium_bio::gff::record::parse_attributes;
use annotarium_bio::IndexedGff;
use annotarium_store::{Annotation, AnnotationSequenceMap, Filter};
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

const STREAM_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegionParams {
    pub region: Option<String>,
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub feature_type: Option<String>,
    pub feature_source: Option<String>,
    pub biotype: Option<String>,
}

/// Post-filter predicates applied to each streamed line.
#[derive(Debug, Clone, Default)]
struct LineFilters {
    feature_type: Option<String>,
    feature_source: Option<String>,
    biotype: Option<String>,
}

impl LineFilters {
    fn matches(&self, line: &str) -> bool {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 9 {
            return false;
        }
        if let Some(feature_type) = &self.feature_type {
            if cols[2].trim() != feature_type {
                return false;
            }
        }
        if let Some(source) = &self.feature_source {
            if cols[1].trim() != source {
                return false;
            }
        }
        if let Some(biotype) = &self.biotype {
            let attrs = parse_attributes(cols[8]);
            let found = ["biotype", "gene_biotype", "transcript_biotype"]
                .iter()
                .any(|key| attrs.get(*key) == Some(biotype));
            if !found {
                return false;
            }
        }
        true
    }
}

pub async fn stream_region_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<RegionParams>,
) -> ApiResult<Response> {
    let annotation = state
        .store
        .get::<Annotation>(&id)?
        .ok_or_else(|| ApiError::not_found(format!("annotation {id}")))?;

    validate(&annotation, &params)?;
    let indexed = crate::handlers::annotations::open_indexed(&state, &annotation)?;

    let seqid = match &params.region {
        Some(region) => Some(resolve_region(&state, &indexed, &annotation, region)?),
        None => None,
    };

    let filters = LineFilters {
        feature_type: params.feature_type.clone(),
        feature_source: params.feature_source.clone(),
        biotype: params.biotype.clone(),
    };

    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Vec<u8>, std::io::Error>>(
        STREAM_CHANNEL_CAPACITY,
    );
    let start = params.start;
    let end = params.end;
    tokio::task::spawn_blocking(move || {
        let lines: Box<dyn Iterator<Item = _>> = match &seqid {
            Some(seqid) => match indexed.query(seqid, start, end) {
                Ok(iter) => Box::new(iter),
                Err(e) => {
                    let _ = tx.blocking_send(Err(std::io::Error::other(e.to_string())));
                    return;
                }
            },
            None => match indexed.scan() {
                Ok(iter) => Box::new(iter),
                Err(e) => {
                    let _ = tx.blocking_send(Err(std::io::Error::other(e.to_string())));
                    return;
                }
            },
        };

        for line in lines {
            let chunk = match line {
                Ok(line) => {
                    if !filters.matches(&line) {
                        continue;
                    }
                    let mut bytes = line.into_bytes();
                    bytes.push(b'\n');
                    Ok(bytes)
                }
                Err(e) => Err(std::io::Error::other(e.to_string())),
            };
            let failed = chunk.is_err();
            if tx.blocking_send(chunk).is_err() {
                // client went away; stop reading the file
                debug!("region stream receiver dropped");
                return;
            }
            if failed {
                return;
            }
        }
    });

    let body = Body::from_stream(ReceiverStream::new(rx));
    let response = Response::builder()
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(body)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(response)
}

/// Whole-file unfiltered streams are rejected; interval sanity and filter
/// values are checked against the stored feature overview.
fn validate(annotation: &Annotation, params: &RegionParams) -> ApiResult<()> {
    if params.region.is_none()
        && params.feature_type.is_none()
        && params.feature_source.is_none()
        && params.biotype.is_none()
    {
        return Err(ApiError::bad_request(
            "at least one of region, feature_type, feature_source, biotype is required; \
             use the download endpoint for whole files",
        ));
    }
    if let (Some(start), Some(end)) = (params.start, params.end) {
        if start > end {
            return Err(ApiError::bad_request(format!(
                "invalid interval: start {start} > end {end}"
            )));
        }
    }

    let summary = &annotation.features_summary;
    if let Some(feature_type) = &params.feature_type {
        if !summary.feature_types.contains(feature_type) {
            return Err(ApiError::bad_request_with_allowed(
                format!("unknown feature_type: {feature_type}"),
                summary.feature_types.iter().cloned(),
            ));
        }
    }
    if let Some(source) = &params.feature_source {
        if !summary.sources.contains(source) {
            return Err(ApiError::bad_request_with_allowed(
                format!("unknown feature_source: {source}"),
                summary.sources.iter().cloned(),
            ));
        }
    }
    if let Some(biotype) = &params.biotype {
        if !summary.biotypes.contains(biotype) {
            return Err(ApiError::bad_request_with_allowed(
                format!("unknown biotype: {biotype}"),
                summary.biotypes.iter().cloned(),
            ));
        }
    }
    Ok(())
}

/// Alias lookup through the sequence map first, then the raw contig list.
fn resolve_region(
    state: &AppState,
    indexed: &IndexedGff,
    annotation: &Annotation,
    region: &str,
) -> ApiResult<String> {
    let rows: Vec<AnnotationSequenceMap> = state.store.find(
        &Filter::And(vec![
            Filter::eq("annotation_id", annotation.annotation_id.as_str()),
            Filter::Contains("aliases".to_string(), json!(region)),
        ]),
        &Default::default(),
    )?;
    if let Some(row) = rows.into_iter().next() {
        return Ok(row.sequence_id);
    }

    if indexed.has_contig(region) {
        return Ok(region.to_string());
    }

    // direct sequence-id hit in the map (contig not in mapped aliases)
    if annotation.mapped_regions.iter().any(|r| r == region) {
        return Ok(region.to_string());
    }

    Err(ApiError::not_found(format!("region not found: {region}")))
}
