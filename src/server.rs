use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::{Method, header},
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::ProxyError, proxy::ProxyResponse, service::TranslationService};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TranslationService>,
}

pub fn build_router(service: Arc<TranslationService>) -> Router {
    let state = AppState { service };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/invoke", post(invoke))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

async fn invoke(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<ProxyResponse, ProxyError> {
    let body = body.map_err(|rejection| {
        tracing::warn!(%rejection, "rejected request body");
        ProxyError::RequestBody(rejection.body_text())
    })?;
    Ok(state.service.handle(&body, false).await)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::model::{BackendError, ModelBackend, REMEDIATION_HINT};

    struct EchoBackend;

    #[async_trait]
    impl ModelBackend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        async fn invoke_model(
            &self,
            _model_id: &str,
            body: Vec<u8>,
        ) -> Result<Vec<u8>, BackendError> {
            let request: Value = serde_json::from_slice(&body).unwrap();
            let prompt = request["messages"][0]["content"][0]["text"].clone();
            if prompt == "forbidden" {
                return Err(BackendError::Service {
                    status: 403,
                    kind: "AccessDeniedException".into(),
                    message: "not authorized".into(),
                });
            }
            Ok(serde_json::to_vec(&json!({
                "content": [{"type": "text", "text": prompt}],
                "usage": {"input_tokens": 1, "output_tokens": 1}
            }))
            .unwrap())
        }
    }

    fn app() -> Router {
        let service = TranslationService::new(
            Arc::new(EchoBackend),
            "test-model",
            Duration::from_secs(30),
        );
        build_router(Arc::new(service))
    }

    async fn read_json(resp: axum::response::Response) -> Value {
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let resp = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn invoke_returns_generation_result() {
        let resp = app()
            .oneshot(
                Request::post("/invoke")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"prompt": "echo me"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "application/json");
        let body = read_json(resp).await;
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["prompt"], "echo me");
        assert_eq!(body["completion"], "echo me");
        assert_eq!(body["usage"]["output_tokens"], 1);
    }

    #[tokio::test]
    async fn invoke_tolerates_garbage_body() {
        let resp = app()
            .oneshot(
                Request::post("/invoke")
                    .body(Body::from(vec![0xff, 0xfe, 0x00]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = read_json(resp).await;
        assert_eq!(body["prompt"], crate::model::DEFAULT_PROMPT);
    }

    #[tokio::test]
    async fn backend_failure_returns_envelope() {
        let resp = app()
            .oneshot(
                Request::post("/invoke")
                    .body(Body::from(r#"{"prompt": "forbidden"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.headers()["content-type"], "application/json");
        let body = read_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("AccessDeniedException"));
        assert_eq!(body["hint"], REMEDIATION_HINT);
    }

    #[tokio::test]
    async fn oversized_body_returns_envelope() {
        let mut payload = br#"{"prompt":""#.to_vec();
        payload.resize(payload.len() + 3 * 1024 * 1024, b'a');
        payload.extend_from_slice(br#""}"#);

        let resp = app()
            .oneshot(
                Request::post("/invoke")
                    .header("content-type", "application/json")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.headers()["content-type"], "application/json");
        let body = read_json(resp).await;
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .starts_with("failed to read request body")
        );
        assert_eq!(body["hint"], REMEDIATION_HINT);
    }

    #[tokio::test]
    async fn preflight_allows_any_origin() {
        let resp = app()
            .oneshot(
                Request::options("/invoke")
                    .header("origin", "https://example.org")
                    .header("access-control-request-method", "POST")
                    .header("access-control-request-headers", "content-type")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let headers = resp.headers();
        assert_eq!(headers["access-control-allow-origin"], "*");
        let methods = headers["access-control-allow-methods"].to_str().unwrap();
        assert!(methods.contains("POST"));
        assert!(methods.contains("OPTIONS"));
        assert_eq!(headers["access-control-allow-headers"], "content-type");
    }

    #[tokio::test]
    async fn get_on_invoke_is_not_allowed() {
        let resp = app()
            .oneshot(Request::get("/invoke").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
