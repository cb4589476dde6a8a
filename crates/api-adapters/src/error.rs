//! JSON error responses.
//!
//! Every failure leaves the API as
//! `{"error": {"kind": "<stable kind>", "message": "..."}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::DomainError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// No usable bearer token. Distinct from `DomainError::Unauthorized`,
    /// which means the caller is known but not allowed.
    #[error("{0}")]
    Unauthenticated(String),
}

impl ApiError {
    /// Token-level failures become 401; anything else keeps its own status.
    pub fn from_auth(err: DomainError) -> Self {
        match err {
            DomainError::Unauthorized(msg) => ApiError::Unauthenticated(msg),
            other => ApiError::Domain(other),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Domain(err) => match err {
                DomainError::Validation(_) => StatusCode::BAD_REQUEST,
                DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
                DomainError::Unauthorized(_) => StatusCode::FORBIDDEN,
                DomainError::CryptoFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
                DomainError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
                DomainError::Conflict(_) => StatusCode::CONFLICT,
                DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::Domain(err) => err.kind(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Domain(DomainError::Internal(detail)) => {
                error!(%detail, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "kind": self.kind(),
                "message": message,
            }
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
