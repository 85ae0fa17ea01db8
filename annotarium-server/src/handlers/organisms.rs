//! Organism read endpoints

use crate::errors::{ApiError, ApiResult};
use crate::params::ListParams;
use crate::AppState;
use annotarium_store::Organism;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::{json, Value};

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Value>> {
    let filter = params.filter(None);
    let items = state
        .store
        .find_values::<Organism>(&filter, &params.find_options())?;
    let total = state.store.count::<Organism>(&filter)?;
    Ok(Json(json!({ "total": total, "items": items })))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(taxid): Path<u32>,
) -> ApiResult<Json<Organism>> {
    let organism = state
        .store
        .get::<Organism>(&taxid.to_string())?
        .ok_or_else(|| ApiError::not_found(format!("organism {taxid}")))?;
    Ok(Json(organism))
}
