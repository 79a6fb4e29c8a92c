//! API error type and its HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, ErrorKind};
use fulfillment::FulfillmentError;
use projections::ProjectionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request: bad identity headers, ids or bodies.
    #[error("{0}")]
    BadRequest(String),

    /// The caller's role may not touch this resource.
    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Fulfillment(#[from] FulfillmentError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Domain(err) => status_for(err.kind()),
            ApiError::Fulfillment(err) => status_for(err.kind()),
            ApiError::Projection(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// 400 for bad input, 422 when the request is well formed but the shop
/// cannot honour it, 409 for state and version clashes.
fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::UnavailableItems | ErrorKind::InsufficientPoints => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ErrorKind::IllegalTransition | ErrorKind::ConcurrencyConflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        metrics::counter!("api_errors_total", "status" => status.as_str().to_owned()).increment(1);

        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
