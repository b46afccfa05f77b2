use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failure taxonomy for the REST surface. Every variant renders as the same
/// `{"success": false, "message": ...}` envelope; the status code is set
/// conventionally but the envelope is the client contract.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    /// A uniqueness rule was violated (duplicate email).
    #[error("{0}")]
    Conflict(String),

    /// Bad credentials, or a missing/invalid/expired token.
    #[error("{0}")]
    Auth(String),

    /// The asset store or another dependency failed mid-request.
    #[error("{0}")]
    Upstream(String),

    /// Anything unexpected. The cause is logged server-side; its display
    /// string goes to the wire like every other failure.
    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if let ApiError::Internal(source) = &self {
            error!("Internal error: {:#}", source);
        }

        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Type alias for handler results
pub type ApiResult<T> = Result<T, ApiError>;
