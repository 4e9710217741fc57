//! Standardized error handling for API responses
//!
//! Every failure leaves the server as a failure envelope wrapping an
//! `ErrorResponse`, with the HTTP status taken from the error's kind.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use clustergate_common::{Envelope, ErrorKind};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::kubernetes::error::K8sError;

/// Standard API error response format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status code
    pub status: u16,

    /// Error code for programmatic handling
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Timestamp when error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(status: u16, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            message: message.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// API error types with standardized responses
#[derive(Debug)]
pub enum ApiError {
    /// Failure of a gateway operation, rendered by its kind
    Gateway(K8sError),

    /// 400 Bad Request, for requests that never reached the gateway
    BadRequest(String),

    /// 503 Service Unavailable
    ServiceUnavailable(String),

    /// 500 Internal Server Error
    Internal(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Gateway(err) => err.kind(),
            ApiError::BadRequest(_) => ErrorKind::BadRequest,
            ApiError::ServiceUnavailable(_) => ErrorKind::Unavailable,
            ApiError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Convert error to ErrorResponse
    pub fn to_error_response(&self) -> ErrorResponse {
        let kind = self.kind();
        match self {
            // The raw message stays in the log
            ApiError::Internal(msg) | ApiError::Gateway(K8sError::Internal(msg)) => {
                error!("Internal API error: {}", msg);
                ErrorResponse::new(
                    kind.status_code(),
                    kind.as_str(),
                    "An internal server error occurred",
                )
            }
            ApiError::Gateway(err) => {
                ErrorResponse::new(kind.status_code(), kind.as_str(), err.to_string())
            }
            ApiError::BadRequest(msg) | ApiError::ServiceUnavailable(msg) => {
                ErrorResponse::new(kind.status_code(), kind.as_str(), msg.as_str())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_response = self.to_error_response();
        let status_code = StatusCode::from_u16(error_response.status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (status_code, Json(Envelope::failure(error_response))).into_response()
    }
}

impl From<K8sError> for ApiError {
    fn from(err: K8sError) -> Self {
        ApiError::Gateway(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(format!("Invalid path: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(format!("Invalid query: {}", rejection.body_text()))
    }
}
