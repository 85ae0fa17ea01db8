//! Request handlers

pub mod admin;
pub mod annotations;
pub mod assemblies;
pub mod organisms;
pub mod taxons;

use axum::http::StatusCode;
use axum::response::IntoResponse;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
