use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::validation::ValidationError;

/// The full error taxonomy of the service. This is a closed set: every
/// failure a caller can observe maps onto exactly one of these kinds.
/// Expected protocol outcomes (a failed hash check, a failed payment) are
/// values, not errors, and never pass through here.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate transaction: {0}")]
    DuplicateTransaction(String),

    #[error("hash verification failed: {0}")]
    HashMismatch(String),

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("gateway unavailable, retry later: {0}")]
    GatewayRetry(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateTransaction(_) => StatusCode::CONFLICT,
            AppError::HashMismatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::GatewayRetry(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Duplicate(desc) => AppError::DuplicateTransaction(desc),
            GatewayError::Retryable(desc) => AppError::GatewayRetry(desc),
            GatewayError::CircuitOpen => {
                AppError::GatewayRetry("gateway circuit breaker open".to_string())
            }
            GatewayError::Rejected(desc) | GatewayError::InvalidResponse(desc) => {
                AppError::Gateway(desc)
            }
            GatewayError::Request(e) => AppError::Gateway(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
