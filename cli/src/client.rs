// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP client for communicating with a running gateway

use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use llm_gateway_core::domain::llm::ModelInfo;
use llm_gateway_core::presentation::api::GenerateResponse;

/// `POST /generate` body as sent by the CLI
#[derive(Debug, Default, Clone, Serialize)]
pub struct GenerateBody {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    kind: String,
    message: String,
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            // Generation may legitimately take minutes; the gateway enforces its own deadline
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn generate(&self, body: &GenerateBody) -> Result<GenerateResponse> {
        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach gateway at {}", self.base_url))?;

        let response = Self::check(response, "Generation failed").await?;
        response
            .json()
            .await
            .context("Failed to parse generate response")
    }

    pub async fn available_models(&self) -> Result<BTreeMap<String, ModelInfo>> {
        let response = self
            .client
            .get(format!("{}/available_models", self.base_url))
            .send()
            .await
            .with_context(|| format!("Failed to reach gateway at {}", self.base_url))?;

        let response = Self::check(response, "Failed to list models").await?;
        response
            .json()
            .await
            .context("Failed to parse models response")
    }

    pub async fn health(&self) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .with_context(|| format!("Failed to reach gateway at {}", self.base_url))?;

        let response = Self::check(response, "Health check failed").await?;
        response
            .json()
            .await
            .context("Failed to parse health response")
    }

    /// Turn a non-success response into an error naming the failure kind
    async fn check(response: Response, action: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorEnvelope>(&error_text) {
            Ok(envelope) => anyhow::bail!(
                "{} ({} {}): {}",
                action,
                status.as_u16(),
                envelope.error.kind,
                envelope.error.message
            ),
            Err(_) => anyhow::bail!("{} ({}): {}", action, status.as_u16(), error_text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_generate() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/generate")
            .match_body(Matcher::Json(json!({"prompt": "Hello", "model": "local"})))
            .with_status(200)
            .with_body(
                json!({
                    "text": "Hi!",
                    "backend": "local",
                    "metadata": {
                        "backend": "local",
                        "backend_kind": "local",
                        "model": "qwen2.5-7b-instruct",
                        "finish_reason": "stop",
                        "latency_ms": 420
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = GatewayClient::new(format!("{}/", server.url())).unwrap();
        let response = client
            .generate(&GenerateBody {
                prompt: "Hello".into(),
                model: Some("local".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.text, "Hi!");
        assert_eq!(response.metadata.latency_ms, 420);
        assert!(response.metadata.usage.is_none());
    }

    #[tokio::test]
    async fn test_structured_error_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/generate")
            .with_status(404)
            .with_body(r#"{"error":{"kind":"UnknownModel","message":"unknown model 'nonexistent'","retryable":false}}"#)
            .create_async()
            .await;

        let client = GatewayClient::new(server.url()).unwrap();
        let err = client
            .generate(&GenerateBody {
                prompt: "Hello".into(),
                model: Some("nonexistent".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("404 UnknownModel"), "{}", message);
        assert!(message.contains("nonexistent"), "{}", message);
    }

    #[tokio::test]
    async fn test_available_models() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/available_models")
            .with_status(200)
            .with_body(
                json!({
                    "local": {
                        "name": "local",
                        "backend_kind": "local",
                        "model": "local-model",
                        "endpoint": "http://localhost:1234/v1",
                        "is_local": true,
                        "capabilities": {"streaming": true, "context_window": 8192}
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let models = GatewayClient::new(server.url())
            .unwrap()
            .available_models()
            .await
            .unwrap();
        assert_eq!(models.len(), 1);
        assert!(models["local"].is_local);
    }
}
