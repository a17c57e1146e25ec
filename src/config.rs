use std::{
    env, fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use anyhow::bail;

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_INVOKE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub model_id: String,
    pub region: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub invoke_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = lookup("SERVER_ADDR")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080));

        let model_id = match lookup("BEDROCK_MODEL_ID") {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => bail!("BEDROCK_MODEL_ID must be set to the model identifier to invoke"),
        };

        let region = lookup("AWS_REGION")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let endpoint = lookup("BEDROCK_ENDPOINT")
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("https://bedrock-runtime.{region}.amazonaws.com"));

        let api_key = lookup("AWS_BEARER_TOKEN_BEDROCK").filter(|v| !v.is_empty());

        let invoke_timeout = lookup("INVOKE_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .filter(|secs: &u64| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_INVOKE_TIMEOUT);

        Ok(Self {
            listen_addr,
            model_id,
            region,
            endpoint,
            api_key,
            invoke_timeout,
        })
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("listen_addr", &self.listen_addr)
            .field("model_id", &self.model_id)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("invoke_timeout", &self.invoke_timeout)
            .finish()
    }
}
