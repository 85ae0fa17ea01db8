//! Taxonomy tree read endpoints

use crate::errors::{ApiError, ApiResult};
use crate::params::ListParams;
use crate::AppState;
use annotarium_store::{Filter, TaxonNode};
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
        .find_values::<TaxonNode>(&filter, &params.find_options())?;
    let total = state.store.count::<TaxonNode>(&filter)?;
    Ok(Json(json!({ "total": total, "items": items })))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(taxid): Path<u32>,
) -> ApiResult<Json<TaxonNode>> {
    fetch(&state, taxid).map(Json)
}

pub async fn children(
    State(state): State<AppState>,
    Path(taxid): Path<u32>,
) -> ApiResult<Json<Value>> {
    let node = fetch(&state, taxid)?;
    let mut children = Vec::new();
    for child in &node.children {
        if let Some(child_node) = state.store.get::<TaxonNode>(&child.to_string())? {
            children.push(child_node);
        }
    }
    Ok(Json(json!({ "taxid": taxid, "children": children })))
}

/// Walk the one-parent tree upward by finding, at each step, the node whose
/// child set contains the current taxid.
pub async fn ancestors(
    State(state): State<AppState>,
    Path(taxid): Path<u32>,
) -> ApiResult<Json<Value>> {
    fetch(&state, taxid)?;
    let mut ancestors: Vec<TaxonNode> = Vec::new();
    let mut current = taxid;
    loop {
        let parents: Vec<TaxonNode> = state.store.find(
            &Filter::Contains("children".to_string(), json!(current)),
            &Default::default(),
        )?;
        let Some(parent) = parents.into_iter().next() else {
            break;
        };
        current = parent.taxid;
        ancestors.push(parent);
    }
    Ok(Json(json!({ "taxid": taxid, "ancestors": ancestors })))
}

fn fetch(state: &AppState, taxid: u32) -> ApiResult<TaxonNode> {
    state
        .store
        .get::<TaxonNode>(&taxid.to_string())?
        .ok_or_else(|| ApiError::not_found(format!("taxon {taxid}")))
}
