// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::application::generation::{GenerationMetadata, GenerationService};
use crate::domain::llm::{
    BackendKind, ErrorKind, GenerationOptions, GenerationRequest, LLMError, ModelInfo,
};
use crate::infrastructure::llm::BackendHealth;

pub struct AppState {
    pub generation_service: Arc<GenerationService>,
}

pub fn app(service: Arc<GenerationService>) -> Router {
    let state = Arc::new(AppState {
        generation_service: service,
    });

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/available_models", get(available_models))
        .route("/models", get(available_models))
        .route("/generate", post(generate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `POST /generate` body.
///
/// Also accepts the legacy shape `{model_type, parameters: {...}}`; flat
/// fields win over their `parameters` counterparts.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub repetition_penalty: Option<f32>,
    #[serde(default)]
    pub stop: Option<Vec<String>>,
    #[serde(default)]
    pub parameters: Option<GenerationOptions>,
}

impl From<GenerateRequest> for GenerationRequest {
    fn from(body: GenerateRequest) -> Self {
        let base = body.parameters.unwrap_or_default();
        let options = GenerationOptions {
            max_tokens: body.max_tokens.or(base.max_tokens),
            temperature: body.temperature.or(base.temperature),
            top_p: body.top_p.or(base.top_p),
            repetition_penalty: body.repetition_penalty.or(base.repetition_penalty),
            presence_penalty: base.presence_penalty,
            frequency_penalty: base.frequency_penalty,
            stop_sequences: body.stop.or(base.stop_sequences),
            system_prompt: body
                .system_prompt
                .filter(|prompt| !prompt.is_empty())
                .or(base.system_prompt),
        };

        GenerationRequest {
            prompt: body.prompt,
            model: body.model.or(body.model_type),
            options,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub text: String,
    /// Kind of backend that served the request
    pub backend: BackendKind,
    pub metadata: GenerationMetadata,
}

/// Maps a classified failure to its HTTP status and structured body
#[derive(Debug)]
pub struct ApiError(pub LLMError);

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
        ErrorKind::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::UpstreamRejected | ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::UnknownModel => StatusCode::NOT_FOUND,
    }
}

impl From<LLMError> for ApiError {
    fn from(err: LLMError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(LLMError::InvalidRequest(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let body = json!({
            "error": {
                "kind": kind.as_str(),
                "message": self.0.to_string(),
                "retryable": kind.is_retryable(),
            }
        });
        (status_for(kind), Json(body)).into_response()
    }
}

async fn root() -> impl IntoResponse {
    Json(json!({ "message": "LLM Gateway API" }))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let registry = state.generation_service.registry();
    let backends: serde_json::Map<String, serde_json::Value> = registry
        .health_check_all()
        .await
        .into_iter()
        .map(|(name, health)| {
            let entry = match health {
                BackendHealth::Available => json!({ "status": "available" }),
                BackendHealth::Error(e) => json!({
                    "status": "error",
                    "kind": e.kind().as_str(),
                    "error": e.to_string(),
                }),
                BackendHealth::NotConfigured(reason) => json!({
                    "status": "not_configured",
                    "error": reason,
                }),
            };
            (name, entry)
        })
        .collect();

    Json(json!({
        "status": "healthy",
        "default_backend": registry.default_backend(),
        "backends": backends,
    }))
}

async fn available_models(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, ModelInfo>> {
    let models = state
        .generation_service
        .registry()
        .model_info_all()
        .into_iter()
        .map(|info| (info.name.clone(), info))
        .collect();
    Json(models)
}

async fn generate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(body) = payload?;
    let result = state.generation_service.handle(body.into()).await?;

    Ok(Json(GenerateResponse {
        text: result.text,
        backend: result.metadata.backend_kind,
        metadata: result.metadata,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gateway_config::GenerationDefaults;
    use crate::domain::llm::{
        FinishReason, GenerationResponse, LLMProvider, ModelCapabilities,
    };
    use crate::infrastructure::llm::ProviderRegistry;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    struct FixedProvider {
        info: ModelInfo,
        reply: Result<String, LLMError>,
    }

    #[async_trait]
    impl LLMProvider for FixedProvider {
        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<GenerationResponse, LLMError> {
            self.reply.clone().map(|text| GenerationResponse {
                text,
                usage: None,
                model: self.info.model.clone(),
                finish_reason: FinishReason::Stop,
            })
        }

        fn model_info(&self) -> &ModelInfo {
            &self.info
        }

        async fn health_check(&self) -> Result<(), LLMError> {
            self.reply.clone().map(|_| ())
        }
    }

    fn provider(name: &str, kind: BackendKind, reply: Result<&str, LLMError>) -> Arc<dyn LLMProvider> {
        Arc::new(FixedProvider {
            info: ModelInfo {
                name: name.to_string(),
                backend_kind: kind,
                model: format!("{}-model", name),
                endpoint: format!("http://{}", name),
                is_local: kind.is_local(),
                capabilities: ModelCapabilities {
                    streaming: true,
                    context_window: 8192,
                },
            },
            reply: reply.map(str::to_string),
        })
    }

    fn router() -> Router {
        let mut registry = ProviderRegistry::new(Duration::from_secs(5));
        registry.register(provider("hosted", BackendKind::Hosted, Ok("Hi from hosted")));
        registry.register(provider("local", BackendKind::Local, Ok("Hi from local")));
        registry.register(provider(
            "down",
            BackendKind::Hosted,
            Err(LLMError::unavailable("down", "Connection refused")),
        ));
        registry.register(provider(
            "slow",
            BackendKind::GigaChat,
            Err(LLMError::timeout("slow", "operation timed out")),
        ));

        let service = GenerationService::new(
            Arc::new(registry),
            GenerationDefaults::default(),
            Duration::from_secs(5),
        );
        app(Arc::new(service))
    }

    async fn post_generate(body: &str) -> (StatusCode, serde_json::Value) {
        let response = router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/generate")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_generate_success() {
        let (status, body) = post_generate(r#"{"prompt": "Hello", "model": "hosted"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "Hi from hosted");
        assert_eq!(body["backend"], "hosted");
        assert_eq!(body["metadata"]["backend"], "hosted");
        assert_eq!(body["metadata"]["model"], "hosted-model");
    }

    #[tokio::test]
    async fn test_legacy_model_type() {
        let (status, body) = post_generate(
            r#"{"prompt": "Hello", "model_type": "local", "parameters": {"temperature": 0.1}}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["backend"], "local");
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        let cases = [
            (r#"{"prompt": "Hello", "model": "nonexistent"}"#, StatusCode::NOT_FOUND, "UnknownModel"),
            (r#"{"prompt": "Hello", "model": "down"}"#, StatusCode::BAD_GATEWAY, "UpstreamUnavailable"),
            (r#"{"prompt": "Hello", "model": "slow"}"#, StatusCode::GATEWAY_TIMEOUT, "UpstreamTimeout"),
            (r#"{"prompt": ""}"#, StatusCode::BAD_REQUEST, "InvalidRequest"),
            (r#"{"prompt": "Hello", "temperature": 9.0}"#, StatusCode::BAD_REQUEST, "InvalidRequest"),
            (r#"{"model": "hosted"}"#, StatusCode::BAD_REQUEST, "InvalidRequest"),
            ("not json", StatusCode::BAD_REQUEST, "InvalidRequest"),
        ];

        for (request, status, kind) in cases {
            let (actual_status, body) = post_generate(request).await;
            assert_eq!(actual_status, status, "{}", request);
            assert_eq!(body["error"]["kind"], kind, "{}", request);
            assert!(body["error"]["message"].is_string());
        }
    }

    #[test]
    fn test_flat_fields_win_over_parameters() {
        let body: GenerateRequest = serde_json::from_str(
            r#"{
                "prompt": "Hello",
                "system_prompt": "",
                "max_tokens": 50,
                "parameters": {"max_tokens": 10, "temperature": 0.3, "system_prompt": "Be terse."}
            }"#,
        )
        .unwrap();

        let request: GenerationRequest = body.into();
        assert_eq!(request.model, None);
        assert_eq!(request.options.max_tokens, Some(50));
        assert_eq!(request.options.temperature, Some(0.3));
        assert_eq!(request.options.system_prompt.as_deref(), Some("Be terse."));
    }

    #[test]
    fn test_legacy_parameters_stop() {
        let body: GenerateRequest = serde_json::from_str(
            r#"{"prompt": "Hello", "model_type": "hosted", "parameters": {"stop": ["\n\n"]}}"#,
        )
        .unwrap();

        let request: GenerationRequest = body.into();
        assert_eq!(request.model.as_deref(), Some("hosted"));
        assert_eq!(request.options.stop_sequences, Some(vec!["\n\n".to_string()]));
    }

    #[tokio::test]
    async fn test_available_models_lists_every_backend() {
        let response = router()
            .oneshot(Request::builder().uri("/available_models").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.as_object().unwrap().len(), 4);
        assert_eq!(body["local"]["backend_kind"], "local");
        assert_eq!(body["local"]["is_local"], true);
    }

    #[tokio::test]
    async fn test_health_reports_backend_status() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["default_backend"], "hosted");
        assert_eq!(body["backends"]["hosted"]["status"], "available");
        assert_eq!(body["backends"]["down"]["status"], "error");
        assert_eq!(body["backends"]["down"]["kind"], "UpstreamUnavailable");
    }
}
