use std::{sync::Arc, time::Duration};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use tracing::{error, info, warn};

use crate::{
    config::AppConfig,
    error::ProxyError,
    model::{GenerationRequest, GenerationResult, ModelBackend, ModelRequest, ModelResponse},
    proxy::{ProxyEvent, ProxyResponse},
};

/// Translates caller requests into model invocations and back.
///
/// Built once per process; the backend handle is shared by every request.
pub struct TranslationService {
    backend: Arc<dyn ModelBackend>,
    model_id: String,
    invoke_timeout: Duration,
}

impl TranslationService {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        model_id: impl Into<String>,
        invoke_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            model_id: model_id.into(),
            invoke_timeout,
        }
    }

    pub fn from_config(backend: Arc<dyn ModelBackend>, config: &AppConfig) -> Self {
        Self::new(backend, config.model_id.clone(), config.invoke_timeout)
    }

    pub async fn handle_event(&self, event: &ProxyEvent) -> ProxyResponse {
        let body = event.body.as_deref().unwrap_or_default();
        self.handle(body.as_bytes(), event.is_base64_encoded).await
    }

    /// Runs one request through the pipeline. Never fails: errors become a 500 envelope.
    pub async fn handle(&self, raw_body: &[u8], is_base64_encoded: bool) -> ProxyResponse {
        match self.generate(raw_body, is_base64_encoded).await {
            Ok(result) => ProxyResponse::ok(&result),
            Err(err) => {
                error!(model_id = %self.model_id, %err, "generation failed");
                ProxyResponse::from_error(&err)
            }
        }
    }

    pub async fn generate(
        &self,
        raw_body: &[u8],
        is_base64_encoded: bool,
    ) -> Result<GenerationResult, ProxyError> {
        let request = decode_body(raw_body, is_base64_encoded).resolve()?;
        info!(
            model_id = %self.model_id,
            backend = self.backend.name(),
            max_tokens = request.max_tokens,
            temperature = request.temperature,
            "invoking model"
        );

        let body = serde_json::to_vec(&ModelRequest::new(&request))?;
        let raw = tokio::time::timeout(
            self.invoke_timeout,
            self.backend.invoke_model(&self.model_id, body),
        )
        .await
        .map_err(|_| ProxyError::Timeout(self.invoke_timeout))??;

        let response = ModelResponse::from_json(&raw)?;
        Ok(GenerationResult {
            model: self.model_id.clone(),
            completion: response.completion(),
            prompt: request.prompt,
            usage: response.usage,
        })
    }
}

fn decode_body(raw_body: &[u8], is_base64_encoded: bool) -> GenerationRequest {
    if !is_base64_encoded {
        return GenerationRequest::from_json(raw_body);
    }
    let trimmed = raw_body.trim_ascii();
    match STANDARD.decode(trimmed) {
        Ok(decoded) => GenerationRequest::from_json(&decoded),
        Err(err) => {
            warn!(%err, "request body is not valid base64, using defaults");
            GenerationRequest::default()
        }
    }
}
