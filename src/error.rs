use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Application-level error taxonomy. Handlers return this and the
/// transport mapping below turns each kind into a status code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Unknown email, wrong password and unactivated account all collapse
    /// into this one message so responses cannot be used to enumerate
    /// registered accounts.
    pub fn invalid_credentials() -> Self {
        AppError::Unauthorized("invalid email or password".into())
    }

    /// A credential-store failure is a downstream outage, not a caller error.
    pub fn store(e: anyhow::Error) -> Self {
        error!(error = %e, "credential store failure");
        AppError::Unavailable("credential store unavailable".into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(e) => {
                error!(error = %e, "unhandled internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}
