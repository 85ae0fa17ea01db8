//! Assembly read endpoints

use crate::errors::{ApiError, ApiResult};
use crate::params::ListParams;
use crate::AppState;
use annotarium_store::GenomeAssembly;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::{json, Value};

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Value>> {
    let filter = params.filter(Some("source_db"));
    let items = state
        .store
        .find_values::<GenomeAssembly>(&filter, &params.find_options())?;
    let total = state.store.count::<GenomeAssembly>(&filter)?;
    Ok(Json(json!({ "total": total, "items": items })))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(accession): Path<String>,
) -> ApiResult<Json<GenomeAssembly>> {
    let assembly = state
        .store
        .get::<GenomeAssembly>(&accession)?
        .ok_or_else(|| ApiError::not_found(format!("assembly {accession}")))?;
    Ok(Json(assembly))
}
