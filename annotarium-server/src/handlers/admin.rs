//! Admin-gated write endpoints
//!
//! Every route requires query-parameter equality with the configured shared
//! secret; the comparison is constant-time.

use crate::errors::{ApiError, ApiResult};
use crate::AppState;
use annotarium_bio::stats::FeatureStatsBuilder;
use annotarium_bio::FeatureOverview;
use annotarium_harvest::counts::DerivedCountsMaintainer;
use annotarium_harvest::Orchestrator;
use annotarium_store::{Annotation, MetadataStore, Modify};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub struct AdminParams {
    pub auth_key: Option<String>,
}

fn authorize(state: &AppState, params: &AdminParams) -> ApiResult<()> {
    let Some(expected) = state.config.server.admin_auth_key.as_deref() else {
        return Err(ApiError::Unauthorized);
    };
    let Some(provided) = params.auth_key.as_deref() else {
        return Err(ApiError::Unauthorized);
    };
    if constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Spawn one orchestrator run; 409 while a run is in flight.
pub async fn trigger_ingest(
    State(state): State<AppState>,
    Query(params): Query<AdminParams>,
) -> ApiResult<Json<Value>> {
    authorize(&state, &params)?;

    if state
        .ingest_running
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(ApiError::Conflict("ingestion already running".to_string()));
    }

    let config = (*state.config).clone();
    let store = Arc::clone(&state.store);
    let running = Arc::clone(&state.ingest_running);
    tokio::spawn(async move {
        match Orchestrator::new(config, store) {
            Ok(orchestrator) => match orchestrator.run().await {
                Ok(report) => info!(?report, "triggered ingestion finished"),
                Err(e) => error!(error = %e, "triggered ingestion failed"),
            },
            Err(e) => error!(error = %e, "cannot build orchestrator"),
        }
        running.store(false, Ordering::SeqCst);
    });

    Ok(Json(json!({ "status": "started" })))
}

pub async fn update_counts(
    State(state): State<AppState>,
    Query(params): Query<AdminParams>,
) -> ApiResult<Json<Value>> {
    authorize(&state, &params)?;
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || DerivedCountsMaintainer::new(&store).sweep_all())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(json!({ "status": "updated" })))
}

/// Recompute one annotation's feature summary and statistics from its
/// artifacts on disk.
pub async fn refresh_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<AdminParams>,
) -> ApiResult<Json<Value>> {
    authorize(&state, &params)?;
    let annotation = state
        .store
        .get::<Annotation>(&id)?
        .ok_or_else(|| ApiError::not_found(format!("annotation {id}")))?;

    let store = Arc::clone(&state.store);
    let state_clone = state.clone();
    tokio::task::spawn_blocking(move || refresh(&state_clone, &store, &annotation))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(json!({ "status": "refreshed", "annotation_id": id })))
}

fn refresh(state: &AppState, store: &MetadataStore, annotation: &Annotation) -> ApiResult<()> {
    let indexed = crate::handlers::annotations::open_indexed(state, annotation)?;

    let summary = FeatureOverview::scan_lines(
        indexed
            .scan()
            .map_err(|e| ApiError::Internal(e.to_string()))?,
    )
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    let mut builder = FeatureStatsBuilder::default();
    for line in indexed
        .scan()
        .map_err(|e| ApiError::Internal(e.to_string()))?
    {
        builder
            .push_line(&line.map_err(|e| ApiError::Internal(e.to_string()))?)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
    }
    let statistics = builder.finish();

    store.modify::<Annotation>(
        &annotation.annotation_id,
        &[
            Modify::Set(
                "features_summary".to_string(),
                serde_json::to_value(&summary).map_err(|e| ApiError::Internal(e.to_string()))?,
            ),
            Modify::Set(
                "features_statistics".to_string(),
                serde_json::to_value(&statistics)
                    .map_err(|e| ApiError::Internal(e.to_string()))?,
            ),
        ],
    )?;
    Ok(())
}
