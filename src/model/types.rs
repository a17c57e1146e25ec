use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProxyError;

pub const DEFAULT_PROMPT: &str = "Say hello in one sentence.";
pub const DEFAULT_MAX_TOKENS: u32 = 256;
pub const DEFAULT_TEMPERATURE: f64 = 0.2;
pub const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
pub const REMEDIATION_HINT: &str =
    "Ensure the model is enabled in this region and your IAM role allows invoking the model.";

/// Caller-supplied fields, kept loosely typed until [`GenerationRequest::resolve`].
#[derive(Debug, Default, Deserialize)]
pub struct GenerationRequest {
    #[serde(default)]
    pub prompt: Option<Value>,
    #[serde(default)]
    pub max_tokens: Option<Value>,
    #[serde(default)]
    pub temperature: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl GenerationRequest {
    /// Parses a request body, treating anything that is not a JSON object as an empty request.
    pub fn from_json(raw: &[u8]) -> Self {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }
        match serde_json::from_slice::<Value>(raw) {
            Ok(value @ Value::Object(_)) => {
                serde_json::from_value(value).unwrap_or_default()
            }
            Ok(other) => {
                tracing::warn!(
                    kind = json_kind(&other),
                    "request body is not an object, using defaults"
                );
                Self::default()
            }
            Err(err) => {
                tracing::warn!(%err, "request body is not valid JSON, using defaults");
                Self::default()
            }
        }
    }

    pub fn resolve(self) -> Result<ResolvedRequest, ProxyError> {
        Ok(ResolvedRequest {
            prompt: resolve_prompt(self.prompt)?,
            max_tokens: resolve_max_tokens(self.max_tokens)?,
            temperature: resolve_temperature(self.temperature)?,
        })
    }
}

fn resolve_prompt(value: Option<Value>) -> Result<String, ProxyError> {
    match value {
        None | Some(Value::Null) => Ok(DEFAULT_PROMPT.to_string()),
        Some(Value::String(s)) if s.is_empty() => Ok(DEFAULT_PROMPT.to_string()),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(ProxyError::invalid(
            "prompt",
            format!("expected a string, got {}", json_kind(&other)),
        )),
    }
}

fn resolve_max_tokens(value: Option<Value>) -> Result<u32, ProxyError> {
    let raw: i128 = match value {
        None | Some(Value::Null) => return Ok(DEFAULT_MAX_TOKENS),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i128::from(i)
            } else if let Some(u) = n.as_u64() {
                i128::from(u)
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() => f.trunc() as i128,
                    _ => {
                        return Err(ProxyError::invalid(
                            "max_tokens",
                            format!("cannot convert {n} to an integer"),
                        ));
                    }
                }
            }
        }
        Some(Value::String(s)) => s.trim().parse::<i128>().map_err(|_| {
            ProxyError::invalid(
                "max_tokens",
                format!("could not convert '{s}' to an integer"),
            )
        })?,
        Some(other) => {
            return Err(ProxyError::invalid(
                "max_tokens",
                format!("expected an integer, got {}", json_kind(&other)),
            ));
        }
    };

    match u32::try_from(raw) {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ProxyError::invalid(
            "max_tokens",
            format!("{raw} is out of range, expected a positive integer"),
        )),
    }
}

fn resolve_temperature(value: Option<Value>) -> Result<f64, ProxyError> {
    let parsed = match value {
        None | Some(Value::Null) => return Ok(DEFAULT_TEMPERATURE),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => Some(s.trim().parse::<f64>().map_err(|_| {
            ProxyError::invalid("temperature", format!("could not convert '{s}' to a float"))
        })?),
        Some(other) => {
            return Err(ProxyError::invalid(
                "temperature",
                format!("expected a number, got {}", json_kind(&other)),
            ));
        }
    };

    match parsed {
        Some(t) if t.is_finite() => Ok(t),
        _ => Err(ProxyError::invalid("temperature", "must be a finite number")),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Messages API envelope expected by Anthropic models on Bedrock.
#[derive(Debug, Serialize)]
pub struct ModelRequest<'a> {
    pub anthropic_version: &'static str,
    pub max_tokens: u32,
    pub temperature: f64,
    pub messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
pub struct Message<'a> {
    pub role: &'static str,
    pub content: [TextBlock<'a>; 1],
}

#[derive(Debug, Serialize)]
pub struct TextBlock<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: &'a str,
}

impl<'a> ModelRequest<'a> {
    pub fn new(request: &'a ResolvedRequest) -> Self {
        ModelRequest {
            anthropic_version: ANTHROPIC_VERSION,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: [Message {
                role: "user",
                content: [TextBlock {
                    kind: "text",
                    text: &request.prompt,
                }],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default = "empty_usage")]
    pub usage: Value,
}

/// One typed block of backend output. Only `text` blocks carry completion text.
#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

fn empty_usage() -> Value {
    Value::Object(Default::default())
}

impl ModelResponse {
    pub fn from_json(raw: &[u8]) -> Result<Self, ProxyError> {
        serde_json::from_slice(raw).map_err(|e| ProxyError::MalformedResponse(e.to_string()))
    }

    pub fn completion(&self) -> String {
        self.content
            .iter()
            .filter(|block| block.kind.as_deref() == Some("text"))
            .filter_map(|block| block.text.as_deref())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub model: String,
    pub prompt: String,
    pub completion: String,
    pub usage: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub hint: String,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            hint: REMEDIATION_HINT.to_string(),
        }
    }
}
