//! Annotation read endpoints

use crate::errors::{ApiError, ApiResult};
use crate::params::ListParams;
use crate::AppState;
use annotarium_bio::IndexedGff;
use annotarium_store::{Annotation, AnnotationError, AnnotationSequenceMap, Filter};
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tokio_util::io::ReaderStream;

/// Columns of the TSV export, in order. Dotted paths are store projections.
const TSV_COLUMNS: &[&str] = &[
    "annotation_id",
    "taxid",
    "organism_name",
    "assembly_accession",
    "assembly_name",
    "source_file_info.source_db",
    "source_file_info.url_path",
    "source_file_info.uncompressed_md5",
    "indexed_file_info.file_size",
];

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Response> {
    let filter = params.filter(Some("source_file_info.source_db"));

    if params.wants_tsv() {
        let rows = state
            .store
            .project_fields::<Annotation>(&filter, TSV_COLUMNS)?;
        let mut body = TSV_COLUMNS.join("\t");
        body.push('\n');
        for row in rows {
            let line: Vec<String> = row.iter().map(tsv_cell).collect();
            body.push_str(&line.join("\t"));
            body.push('\n');
        }
        return Ok((
            [(header::CONTENT_TYPE, "text/tab-separated-values")],
            body,
        )
            .into_response());
    }

    let annotations = state
        .store
        .find_values::<Annotation>(&filter, &params.find_options())?;
    let total = state.store.count::<Annotation>(&filter)?;
    Ok(Json(json!({ "total": total, "items": annotations })).into_response())
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Annotation>> {
    let annotation = state
        .store
        .get::<Annotation>(&id)?
        .ok_or_else(|| ApiError::not_found(format!("annotation {id}")))?;
    Ok(Json(annotation))
}

pub async fn contigs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let annotation = state
        .store
        .get::<Annotation>(&id)?
        .ok_or_else(|| ApiError::not_found(format!("annotation {id}")))?;
    let indexed = open_indexed(&state, &annotation)?;
    Ok(Json(json!({ "contigs": indexed.contig_names() })))
}

pub async fn sequences(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    if state.store.get::<Annotation>(&id)?.is_none() {
        return Err(ApiError::not_found(format!("annotation {id}")));
    }
    let rows: Vec<AnnotationSequenceMap> = state.store.find(
        &Filter::eq("annotation_id", id.as_str()),
        &Default::default(),
    )?;
    Ok(Json(json!({ "sequences": rows })))
}

pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let annotation = state
        .store
        .get::<Annotation>(&id)?
        .ok_or_else(|| ApiError::not_found(format!("annotation {id}")))?;
    let path = state
        .config
        .storage
        .annotations_root
        .join(&annotation.indexed_file_info.bgzipped_path);

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| ApiError::Internal(format!("cannot open artifact: {e}")))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{id}.gff.gz"));

    let response = Response::builder()
        .header(header::CONTENT_TYPE, "application/gzip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(response)
}

pub async fn list_errors(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Value>> {
    let rows = state
        .store
        .find_values::<AnnotationError>(&Filter::All, &params.find_options())?;
    Ok(Json(json!({ "errors": rows })))
}

pub(crate) fn open_indexed(state: &AppState, annotation: &Annotation) -> ApiResult<IndexedGff> {
    let root = &state.config.storage.annotations_root;
    IndexedGff::open(
        &root.join(&annotation.indexed_file_info.bgzipped_path),
        &root.join(&annotation.indexed_file_info.csi_path),
    )
    .map_err(|e| ApiError::Internal(format!("cannot open index: {e}")))
}

fn tsv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
