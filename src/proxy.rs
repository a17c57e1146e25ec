//! Gateway proxy event and response shapes.

use std::collections::BTreeMap;

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::error::ProxyError;
use crate::model::{ErrorEnvelope, GenerationResult};

const APPLICATION_JSON: &str = "application/json";

/// Inbound proxy event. Fields other than the body are ignored.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyEvent {
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ProxyResponse {
    fn json(status: StatusCode, body: String) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(header::CONTENT_TYPE.as_str().to_string(), APPLICATION_JSON.to_string());
        Self {
            status_code: status.as_u16(),
            headers,
            body,
        }
    }

    pub fn ok(result: &GenerationResult) -> Self {
        match serde_json::to_string(result) {
            Ok(body) => Self::json(StatusCode::OK, body),
            Err(err) => Self::from_error(&ProxyError::Encode(err)),
        }
    }

    pub fn from_error(err: &ProxyError) -> Self {
        Self::json(err.status_code(), encode_envelope(&err.envelope()))
    }
}

fn encode_envelope(envelope: &ErrorEnvelope) -> String {
    // Serializing two strings cannot fail in practice.
    serde_json::to_string(envelope).unwrap_or_else(|_| {
        format!(
            "{{\"error\":\"failed to encode error\",\"hint\":{:?}}}",
            envelope.hint
        )
    })
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                header::HeaderName::try_from(name.as_str()),
                HeaderValue::from_str(value),
            ) {
                response.headers_mut().insert(name, value);
            }
        }
        response
    }
}
