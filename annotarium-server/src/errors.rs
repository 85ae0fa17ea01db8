//! API error envelope

use annotarium_core::AnnotariumError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    /// 400 with optional allowed-values context
    BadRequest(String, Option<Value>),
    NotFound(String),
    Unauthorized,
    Conflict(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into(), None)
    }

    pub fn bad_request_with_allowed(
        message: impl Into<String>,
        allowed: impl IntoIterator<Item = String>,
    ) -> Self {
        ApiError::BadRequest(
            message.into(),
            Some(Value::Array(
                allowed.into_iter().map(Value::String).collect(),
            )),
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            ApiError::BadRequest(message, allowed) => (
                StatusCode::BAD_REQUEST,
                "bad_request",
                message,
                allowed.map(|a| json!({ "allowed_values": a })),
            ),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message, None),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "invalid auth key".to_string(),
                None,
            ),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "conflict", message, None),
            ApiError::Internal(message) => {
                error!(%message, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "internal server error".to_string(),
                    None,
                )
            }
        };
        let mut body = json!({ "error": { "code": code, "message": message } });
        if let (Some(details), Some(obj)) = (details, body["error"].as_object_mut()) {
            obj.insert("details".to_string(), details);
        }
        (status, Json(body)).into_response()
    }
}

impl From<AnnotariumError> for ApiError {
    fn from(err: AnnotariumError) -> Self {
        match err {
            AnnotariumError::NotFound(message) => ApiError::NotFound(message),
            AnnotariumError::InvalidInput(message) => ApiError::bad_request(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(format!("{err:#}"))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
