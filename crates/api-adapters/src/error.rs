//! # ApiError
//!
//! HTTP face of `DomainError`. Every failure leaves the API as
//! `{"error": "<message>"}` with a status derived from the error kind.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::DomainError;
use serde_json::json;

#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(DomainError::validation(msg))
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self(DomainError::unauthorized(msg))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            DomainError::NotFound(..) => StatusCode::NOT_FOUND,
            DomainError::Validation(_) => StatusCode::BAD_REQUEST,
            DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DomainError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Infrastructure detail stays in the logs.
    fn message(&self) -> String {
        match &self.0 {
            DomainError::NotFound(entity, _) => format!("{entity} not found"),
            DomainError::Validation(msg) | DomainError::Unauthorized(msg) => msg.clone(),
            DomainError::ExternalService(_) => "upstream service failed".to_string(),
            DomainError::Internal(_) => "internal server error".to_string(),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, %status, "request failed");
        } else {
            tracing::debug!(error = %self.0, %status, "request rejected");
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}
