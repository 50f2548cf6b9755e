//! Error responses
//!
//! Every failure leaves the API as `{"status": "error", "message": ...}`.
//! Most routes answer with HTTP 200 and let the body carry the outcome; the
//! reply route also maps the error onto an HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chatbridge_core::BridgeError;
use serde_json::json;
use tracing::error;

/// Structured error response
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Error body carried by an HTTP 200 response
    pub fn in_body(err: BridgeError) -> Self {
        Self::log(&err);
        Self {
            status: StatusCode::OK,
            message: err.to_string(),
        }
    }

    /// Error body with a matching HTTP status
    pub fn with_status(err: BridgeError) -> Self {
        Self::log(&err);
        Self {
            status: status_for(&err),
            message: err.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn log(err: &BridgeError) {
        if !err.is_client_error() {
            error!(error = %err, "Request failed");
        }
    }
}

/// HTTP status for an error
pub fn status_for(err: &BridgeError) -> StatusCode {
    match err {
        BridgeError::Unauthorized => StatusCode::UNAUTHORIZED,
        BridgeError::NotFound(_) => StatusCode::NOT_FOUND,
        BridgeError::BadRequest(_) => StatusCode::BAD_REQUEST,
        BridgeError::Unconfigured(_)
        | BridgeError::Delivery(_)
        | BridgeError::Storage(_)
        | BridgeError::Host(_)
        | BridgeError::Configuration(_)
        | BridgeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "status": "error",
                "message": self.message,
            })),
        )
            .into_response()
    }
}
