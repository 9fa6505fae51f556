use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::executor::{InjectionError, RunnerError};

/// Every failure a handler can report. Rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A required part of the request body is absent.
    #[error("{0}")]
    MissingField(&'static str),

    /// The body is present but not valid JSON of the expected shape.
    #[error("Invalid request body: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Injection(#[from] InjectionError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingField(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Runner(RunnerError::AlreadyRunning) => StatusCode::CONFLICT,
            ApiError::Injection(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            error!(target: "keypilot::server", %status, error = %message, "Request failed");
        } else {
            warn!(target: "keypilot::server", %status, error = %message, "Request rejected");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
