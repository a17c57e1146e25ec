mod backend;
mod types;

pub use backend::{BackendError, BedrockBackend, ModelBackend};
pub use types::{
    ANTHROPIC_VERSION, ContentBlock, DEFAULT_MAX_TOKENS, DEFAULT_PROMPT, DEFAULT_TEMPERATURE,
    ErrorEnvelope, GenerationRequest, GenerationResult, ModelRequest, ModelResponse,
    REMEDIATION_HINT, ResolvedRequest,
};
