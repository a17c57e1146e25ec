pub mod config;
pub mod error;
pub mod model;
pub mod proxy;
pub mod server;
pub mod service;

pub use config::AppConfig;
pub use error::ProxyError;
pub use model::{BedrockBackend, GenerationRequest, GenerationResult, ModelBackend};
pub use proxy::{ProxyEvent, ProxyResponse};
pub use server::build_router;
pub use service::TranslationService;
