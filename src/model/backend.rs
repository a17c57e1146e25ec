//! Outbound model invocation.
//!
//! [`ModelBackend`] is the seam between the translation service and whatever
//! actually runs the model. [`BedrockBackend`] calls the Bedrock runtime
//! `InvokeModel` REST operation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url, header};
use serde::Deserialize;
use thiserror::Error;

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{kind} (HTTP {status}): {message}")]
    Service {
        status: u16,
        kind: String,
        message: String,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend request timed out")]
    Timeout,
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// A model runtime that accepts a JSON request body and returns a JSON response body.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn invoke_model(&self, model_id: &str, body: Vec<u8>) -> Result<Vec<u8>, BackendError>;
}

pub struct BedrockBackend {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct BedrockErrorBody {
    #[serde(default, alias = "Message")]
    message: Option<String>,
}

impl BedrockBackend {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| BackendError::Transport(format!("invalid endpoint '{endpoint}': {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(BackendError::Transport(format!(
                "endpoint '{endpoint}' cannot carry a path"
            )));
        }
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, BackendError> {
        Self::new(
            &config.endpoint,
            config.api_key.clone(),
            config.invoke_timeout,
        )
    }

    /// `{endpoint}/model/{model_id}/invoke`, with the model id percent-encoded as one segment.
    pub fn invoke_url(&self, model_id: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["model", model_id, "invoke"]);
        }
        url
    }
}

#[async_trait]
impl ModelBackend for BedrockBackend {
    fn name(&self) -> &str {
        "bedrock"
    }

    async fn invoke_model(&self, model_id: &str, body: Vec<u8>) -> Result<Vec<u8>, BackendError> {
        let mut request = self
            .client
            .post(self.invoke_url(model_id))
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .body(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.bytes().await?.to_vec());
        }

        let kind = resp
            .headers()
            .get("x-amzn-errortype")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(':').next().unwrap_or(v).to_string());
        let raw = resp.bytes().await.unwrap_or_default();
        Err(service_error(status, kind, &raw))
    }
}

fn service_error(status: StatusCode, kind: Option<String>, raw: &[u8]) -> BackendError {
    let message = serde_json::from_slice::<BedrockErrorBody>(raw)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| String::from_utf8_lossy(raw).trim().to_string());
    let kind = kind.unwrap_or_else(|| fallback_kind(status).to_string());
    BackendError::Service {
        status: status.as_u16(),
        kind,
        message: if message.is_empty() {
            status.canonical_reason().unwrap_or("no message").to_string()
        } else {
            message
        },
    }
}

fn fallback_kind(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "ValidationException",
        403 => "AccessDeniedException",
        404 => "ResourceNotFoundException",
        408 => "ModelTimeoutException",
        424 => "ModelErrorException",
        429 => "ThrottlingException",
        503 => "ServiceUnavailableException",
        _ => "InternalServerException",
    }
}
