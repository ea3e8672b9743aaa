use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use herdbook_core::import::{ImportError, StoreError};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`ImportError`] for pipeline failures and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON error
/// responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A whole-import failure from `herdbook_core`.
    #[error(transparent)]
    Import(#[from] ImportError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Import(err) => classify_import_error(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify an import failure into an HTTP status, error code, and message.
///
/// - Problems with the submitted file map to 422, or 413 for too many rows.
/// - Conflicting resolutions map to 400.
/// - An unreachable store maps to 503; other store failures to 500 with a
///   sanitized message.
fn classify_import_error(err: &ImportError) -> (StatusCode, &'static str, String) {
    match err {
        ImportError::MissingHeader
        | ImportError::MissingColumns(_)
        | ImportError::NoDataRows
        | ImportError::Malformed(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "INVALID_IMPORT_FILE",
            err.to_string(),
        ),
        ImportError::TooManyRows { .. } => {
            (StatusCode::PAYLOAD_TOO_LARGE, "TOO_MANY_ROWS", err.to_string())
        }
        ImportError::ConflictingResolutions(_) => (
            StatusCode::BAD_REQUEST,
            "CONFLICTING_RESOLUTIONS",
            err.to_string(),
        ),
        ImportError::Store(StoreError::Unavailable(msg)) => {
            tracing::error!(error = %msg, "Record store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_UNAVAILABLE",
                "The record store is temporarily unavailable".to_string(),
            )
        }
        ImportError::Store(other) => {
            tracing::error!(error = %other, "Record store error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
