// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// GigaChat LLM Provider Adapter
//
// Two-step protocol: the base64 authorization key is exchanged for a
// short-lived bearer token at the OAuth endpoint, then the token is used for
// chat calls. The token is cached per adapter and shared by concurrent calls;
// at most one exchange is in flight at a time.

use crate::domain::gateway_config::{
    BackendConfig, DEFAULT_GIGACHAT_AUTH_URL, DEFAULT_GIGACHAT_SCOPE,
};
use crate::domain::llm::{
    BackendKind, FinishReason, GenerationOptions, GenerationResponse, LLMError, LLMProvider,
    ModelCapabilities, ModelInfo, TokenUsage,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::http;

/// Tokens this close to expiry are treated as expired
const EXPIRY_MARGIN_SECS: i64 = 60;

pub struct GigaChatAdapter {
    client: reqwest::Client,
    endpoint: String,
    auth_url: String,
    credentials: String,
    scope: String,
    token: Mutex<TokenCell>,
    /// Completed exchanges; read before queueing on `token`
    exchanges: AtomicU64,
    info: ModelInfo,
}

/// State guarded by the token lock
#[derive(Default)]
struct TokenCell {
    current: Option<AccessToken>,
    /// Outcome of the most recent exchange when it failed
    last_failure: Option<LLMError>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + ChronoDuration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Unix epoch milliseconds
    expires_at: i64,
}

#[derive(Serialize)]
struct GigaChatRequest<'a> {
    model: &'a str,
    messages: Vec<GigaChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repetition_penalty: Option<f32>,
    stream: bool,
    update_interval: u32,
}

#[derive(Serialize)]
struct GigaChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct GigaChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<GigaChatChoice>,
    #[serde(default)]
    usage: Option<GigaChatUsage>,
}

#[derive(Deserialize)]
struct GigaChatChoice {
    #[serde(default)]
    message: Option<GigaChatChoiceMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GigaChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct GigaChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl GigaChatAdapter {
    pub fn new(config: &BackendConfig, credentials: String, client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            auth_url: config
                .auth_url
                .clone()
                .unwrap_or_else(|| DEFAULT_GIGACHAT_AUTH_URL.to_string()),
            credentials,
            scope: config
                .scope
                .clone()
                .unwrap_or_else(|| DEFAULT_GIGACHAT_SCOPE.to_string()),
            token: Mutex::new(TokenCell::default()),
            exchanges: AtomicU64::new(0),
            info: ModelInfo {
                name: config.name.clone(),
                backend_kind: BackendKind::GigaChat,
                model: config.model.clone(),
                endpoint: config.endpoint.clone(),
                is_local: false,
                capabilities: ModelCapabilities {
                    streaming: true,
                    context_window: config.context_window,
                },
            },
        }
    }

    /// Return a fresh token, exchanging credentials when the cached one is
    /// missing or about to expire. The lock is held across the exchange so
    /// concurrent callers wait for a single refresh. Callers that queued
    /// behind a failed exchange get its error instead of starting another.
    async fn access_token(&self) -> Result<String, LLMError> {
        let seen = self.exchanges.load(Ordering::Acquire);
        let mut cell = self.token.lock().await;
        if let Some(token) = cell.current.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.value.clone());
            }
            debug!(backend = self.info.name.as_str(), "Access token expired");
        }

        if self.exchanges.load(Ordering::Acquire) != seen {
            if let Some(err) = &cell.last_failure {
                return Err(err.clone());
            }
        }

        let result = self.exchange_credentials().await;
        self.exchanges.fetch_add(1, Ordering::Release);
        match result {
            Ok(token) => {
                let value = token.value.clone();
                cell.current = Some(token);
                cell.last_failure = None;
                Ok(value)
            }
            Err(err) => {
                cell.current = None;
                cell.last_failure = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Drop the cached token unless another caller already replaced it
    async fn invalidate(&self, rejected: &str) {
        let mut cell = self.token.lock().await;
        if cell.current.as_ref().is_some_and(|t| t.value == rejected) {
            cell.current = None;
        }
    }

    async fn exchange_credentials(&self) -> Result<AccessToken, LLMError> {
        let backend = self.info.name.as_str();
        info!(backend, scope = self.scope.as_str(), "Requesting GigaChat access token");

        let result = self.request_token().await;
        let outcome = if result.is_ok() { "success" } else { "error" };
        metrics::counter!(
            "llm_gateway_token_refreshes_total",
            "backend" => backend.to_string(),
            "outcome" => outcome
        )
        .increment(1);

        result
    }

    async fn request_token(&self) -> Result<AccessToken, LLMError> {
        let backend = self.info.name.as_str();
        // Any failure to obtain a token is reported as a rejection
        let reject = |reason: String| LLMError::rejected(backend, format!("token exchange failed: {}", reason));

        let response = self
            .client
            .post(&self.auth_url)
            .header(reqwest::header::AUTHORIZATION, format!("Basic {}", self.credentials))
            .header("RqUID", Uuid::new_v4().to_string())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("scope", self.scope.as_str())])
            .send()
            .await
            .map_err(|e| reject(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(reject(format!("HTTP {}: {}", status, error_text)));
        }

        let token: TokenResponse = response.json().await.map_err(|e| reject(e.to_string()))?;
        let expires_at = DateTime::from_timestamp_millis(token.expires_at)
            .ok_or_else(|| reject(format!("invalid expires_at: {}", token.expires_at)))?;

        Ok(AccessToken {
            value: token.access_token,
            expires_at,
        })
    }

    async fn send_chat(
        &self,
        token: &str,
        request: &GigaChatRequest<'_>,
    ) -> Result<reqwest::Response, LLMError> {
        self.client
            .post(http::join_url(&self.endpoint, "chat/completions"))
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|e| http::classify_transport(&self.info.name, e))
    }
}

#[async_trait]
impl LLMProvider for GigaChatAdapter {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        let backend = self.info.name.as_str();

        let mut messages = Vec::with_capacity(2);
        if let Some(system_prompt) = options.system_prompt() {
            messages.push(GigaChatMessage {
                role: "system",
                content: system_prompt,
            });
        }
        messages.push(GigaChatMessage {
            role: "user",
            content: prompt,
        });

        let request = GigaChatRequest {
            model: &self.info.model,
            messages,
            temperature: options.temperature,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
            repetition_penalty: options.repetition_penalty,
            stream: false,
            update_interval: 0,
        };

        info!(backend, model = self.info.model.as_str(), "Sending request to GigaChat API");

        let token = self.access_token().await?;
        let mut response = self.send_chat(&token, &request).await?;

        // The server may revoke a token before its advertised expiry
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(backend, "GigaChat rejected the cached access token, re-authenticating");
            self.invalidate(&token).await;
            let token = self.access_token().await?;
            response = self.send_chat(&token, &request).await?;
        }

        let completion: GigaChatResponse = http::read_json(backend, response).await?;
        debug!(backend, "Received response from GigaChat API");

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::unavailable(backend, "No choices in response"))?;

        let text = choice
            .message
            .and_then(|m| m.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| LLMError::unavailable(backend, "No content in response message"))?;

        Ok(GenerationResponse {
            text,
            usage: completion.usage.map(|usage| TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            }),
            model: completion.model.unwrap_or_else(|| self.info.model.clone()),
            finish_reason: FinishReason::from_wire(choice.finish_reason.as_deref()),
        })
    }

    fn model_info(&self) -> &ModelInfo {
        &self.info
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let backend = self.info.name.as_str();
        let token = self.access_token().await?;

        let response = self
            .client
            .get(http::join_url(&self.endpoint, "models"))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| http::classify_transport(backend, e))?;

        http::expect_success(backend, response).await
    }
}
