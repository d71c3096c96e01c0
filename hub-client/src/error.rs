//! Maps transport-level failures onto the shared [`DepotError`] taxonomy.

use depot_values::DepotError;

/// Classifies a response status the way §4.3 requires: 401/403 are auth
/// failures, 404 is not-found, the retriable 5xx/408 set is `Transient`,
/// anything else falls back to `InvalidRequest`.
pub fn map_status(repo_id: &str, status: reqwest::StatusCode) -> DepotError {
    match status.as_u16() {
        401 => DepotError::AuthRequired(repo_id.to_string()),
        403 => DepotError::Forbidden(repo_id.to_string()),
        404 => DepotError::ModelSourceNotFound(repo_id.to_string()),
        408 | 500 | 502 | 503 | 504 => DepotError::Transient(format!(
            "hub returned {status} for {repo_id}"
        )),
        _ => DepotError::InvalidRequest(format!("hub returned {status} for {repo_id}")),
    }
}

/// Classifies a transport-level `reqwest::Error` (timeouts, connect failures).
pub fn map_transport(err: &reqwest::Error) -> DepotError {
    if err.is_timeout() || err.is_connect() {
        DepotError::Transient(err.to_string())
    } else {
        DepotError::InvalidRequest(err.to_string())
    }
}

/// True when this error should be retried by [`crate::retry::with_retry`].
pub fn is_retriable(err: &DepotError) -> bool {
    matches!(err, DepotError::Transient(_))
}
