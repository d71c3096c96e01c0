//! HTTP error mapping for the transport layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use depot_values::DepotError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type ApiResult<T> = Result<T, ApiError>;

/// API error types, mapped 1:1 onto the abstract kinds of spec §7.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    ValidationError {
        field: String,
        message: String,
        request_id: Option<String>,
    },
    NotFound(String),
    AuthRequired(String),
    Forbidden(String),
    Conflict(String),
    InsufficientStorage { required: String, available: String },
    UnprocessableEntity(String),
    InternalError(String),
    Timeout(String),
    Cancelled,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            Self::ValidationError { field, message, .. } => {
                write!(f, "Validation Error [field: {field}]: {message}")
            }
            Self::NotFound(msg) => write!(f, "Not Found: {msg}"),
            Self::AuthRequired(msg) => write!(f, "Authentication Required: {msg}"),
            Self::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            Self::Conflict(msg) => write!(f, "Conflict: {msg}"),
            Self::InsufficientStorage { required, available } => {
                write!(f, "Insufficient Storage: need {required}, have {available}")
            }
            Self::UnprocessableEntity(msg) => write!(f, "Unprocessable Entity: {msg}"),
            Self::InternalError(msg) => write!(f, "Internal Error: {msg}"),
            Self::Timeout(msg) => write!(f, "Timeout: {msg}"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug, Serialize, Deserialize)]
struct ProblemDetails {
    #[serde(rename = "type")]
    type_uri: String,
    title: String,
    status: u16,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, title, detail, request_id, errors) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad Request", msg.clone(), None, None),
            Self::ValidationError { field, message, request_id } => (
                StatusCode::BAD_REQUEST,
                "Validation Error",
                format!("Field '{field}': {message}"),
                request_id.clone(),
                Some(serde_json::json!({ field: message })),
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "Not Found", msg.clone(), None, None),
            Self::AuthRequired(msg) => (StatusCode::UNAUTHORIZED, "Authentication Required", msg.clone(), None, None),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "Forbidden", msg.clone(), None, None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", msg.clone(), None, None),
            Self::InsufficientStorage { required, available } => (
                StatusCode::INSUFFICIENT_STORAGE,
                "Insufficient Storage",
                format!("need {required}, have {available}"),
                None,
                None,
            ),
            Self::UnprocessableEntity(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "Unprocessable Entity", msg.clone(), None, None)
            }
            Self::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", msg.clone(), None, None),
            Self::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "Gateway Timeout", msg.clone(), None, None),
            Self::Cancelled => (StatusCode::OK, "Cancelled", "operation cancelled".to_string(), None, None),
        };

        let problem = ProblemDetails {
            type_uri: format!("https://model-depot.dev/errors/{}", title.to_lowercase().replace(' ', "-")),
            title: title.to_string(),
            status: status.as_u16(),
            detail,
            request_id,
            errors,
        };

        (status, Json(problem)).into_response()
    }
}

/// Primary mapping from the core's abstract error kinds to HTTP (§7).
impl From<DepotError> for ApiError {
    fn from(err: DepotError) -> Self {
        match err {
            DepotError::NotFound(msg) => ApiError::NotFound(msg),
            DepotError::AlreadyRunning(msg) => ApiError::Conflict(format!("a download for '{msg}' is already running")),
            DepotError::AuthRequired(msg) => ApiError::AuthRequired(format!("'{msg}' requires authentication")),
            DepotError::Forbidden(msg) => ApiError::Forbidden(msg),
            DepotError::Transient(msg) => ApiError::InternalError(format!("transient error, retries exhausted: {msg}")),
            DepotError::InsufficientDiskSpace { required, available } => {
                ApiError::InsufficientStorage { required, available }
            }
            DepotError::InvalidIdentifier(msg) => ApiError::BadRequest(format!("invalid identifier '{msg}'")),
            DepotError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            DepotError::ModelSourceNotFound(msg) => ApiError::NotFound(format!("no downloader claims model source '{msg}'")),
            DepotError::ModelLoadFailure { model, reason } => {
                ApiError::UnprocessableEntity(format!("failed to load model '{model}': {reason}"))
            }
            DepotError::AdapterUnavailable { format, model_type } => {
                ApiError::UnprocessableEntity(format!("no adapter available for format={format} type={model_type}"))
            }
            DepotError::GenerationFailure(msg) => ApiError::InternalError(format!("generation failed: {msg}")),
            DepotError::Cancelled => ApiError::Cancelled,
            DepotError::Io(msg) => ApiError::InternalError(format!("io error: {msg}")),
            DepotError::ChecksumMismatch { file, expected, actual } => ApiError::UnprocessableEntity(format!(
                "checksum mismatch for '{file}': expected {expected}, got {actual}"
            )),
        }
    }
}
