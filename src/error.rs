use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::model::{BackendError, ErrorEnvelope};
use crate::proxy::ProxyResponse;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to read request body: {0}")]
    RequestBody(String),
    #[error("invalid value for '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("model invocation failed: {0}")]
    Backend(#[from] BackendError),
    #[error("model invocation timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
    #[error("failed to encode model request: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ProxyError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ProxyError::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// Every failure is reported with the same status for now.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::RequestBody(_)
            | ProxyError::InvalidField { .. }
            | ProxyError::Backend(_)
            | ProxyError::Timeout(_)
            | ProxyError::MalformedResponse(_)
            | ProxyError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::new(self.to_string())
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        ProxyResponse::from_error(&self).into_response()
    }
}
