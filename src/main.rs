use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use model_invoke_proxy::{AppConfig, BedrockBackend, TranslationService, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        model_id = %config.model_id,
        region = %config.region,
        endpoint = %config.endpoint,
        "configuring model backend"
    );
    if config.api_key.is_none() {
        tracing::warn!("AWS_BEARER_TOKEN_BEDROCK is not set, requests will be unauthenticated");
    }

    let backend = Arc::new(BedrockBackend::from_config(&config)?);
    let service = Arc::new(TranslationService::from_config(backend, &config));
    let router = build_router(service);

    let listener = TcpListener::bind(config.listen_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "REST server ready");

    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,hyper=warn,axum::rejection=trace".into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
