//! HTTP API for Annotarium: read endpoints over the metadata store,
//! indexed region streaming, and admin-gated pipeline triggers.

pub mod errors;
pub mod handlers;
pub mod params;
pub mod regions;

use annotarium_core::Config;
use annotarium_store::MetadataStore;
use axum::routing::{get, post};
use axum::Router;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<MetadataStore>,
    /// Single-writer guard: only one ingestion run at a time
    pub ingest_running: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<MetadataStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            ingest_running: Arc::new(AtomicBool::new(false)),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/api/annotations", get(handlers::annotations::list))
        .route("/api/annotations/:id", get(handlers::annotations::get_one))
        .route(
            "/api/annotations/:id/contigs",
            get(handlers::annotations::contigs),
        )
        .route(
            "/api/annotations/:id/sequences",
            get(handlers::annotations::sequences),
        )
        .route(
            "/api/annotations/:id/region",
            get(regions::stream_region_handler),
        )
        .route(
            "/api/annotations/:id/download",
            get(handlers::annotations::download),
        )
        .route("/api/errors", get(handlers::annotations::list_errors))
        .route("/api/assemblies", get(handlers::assemblies::list))
        .route(
            "/api/assemblies/:accession",
            get(handlers::assemblies::get_one),
        )
        .route("/api/organisms", get(handlers::organisms::list))
        .route("/api/organisms/:taxid", get(handlers::organisms::get_one))
        .route("/api/taxons", get(handlers::taxons::list))
        .route("/api/taxons/:taxid", get(handlers::taxons::get_one))
        .route(
            "/api/taxons/:taxid/children",
            get(handlers::taxons::children),
        )
        .route(
            "/api/taxons/:taxid/ancestors",
            get(handlers::taxons::ancestors),
        )
        .route("/api/admin/ingest", post(handlers::admin::trigger_ingest))
        .route(
            "/api/admin/update-counts",
            post(handlers::admin::update_counts),
        )
        .route(
            "/api/admin/annotations/:id/refresh-stats",
            post(handlers::admin::refresh_stats),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = state.config.server.bind_addr.clone();
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr, "annotarium server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
