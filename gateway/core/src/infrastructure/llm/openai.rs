// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI LLM Provider Adapter
//
// Anti-Corruption Layer for hosted OpenAI-style chat completion APIs
// (OpenAI, DeepSeek, ...). The chat-completions wire types defined here are
// shared with the local-server adapter.

use crate::domain::gateway_config::BackendConfig;
use crate::domain::llm::{
    BackendKind, FinishReason, GenerationOptions, GenerationResponse, LLMError, LLMProvider,
    ModelCapabilities, ModelInfo, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::http;

pub struct OpenAIAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    info: ModelInfo,
}

#[derive(Debug, Serialize)]
pub(super) struct ChatCompletionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
    pub messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<&'a [String]>,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

impl<'a> ChatCompletionRequest<'a> {
    /// Translate our domain types to the chat-completions payload
    pub fn new(model: Option<&'a str>, prompt: &'a str, options: &'a GenerationOptions) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system_prompt) = options.system_prompt() {
            messages.push(ChatMessage {
                role: "system",
                content: system_prompt,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        Self {
            model,
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
            presence_penalty: options.presence_penalty,
            frequency_penalty: options.frequency_penalty,
            repetition_penalty: None,
            stop: options.stop_sequences.as_deref(),
            stream: false,
        }
    }
}

#[derive(Deserialize)]
pub(super) struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatChoiceMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl ChatCompletionResponse {
    /// Translate the chat-completions response to our domain types. A
    /// missing or empty completion is a failure, never an empty success.
    pub fn into_generation(
        self,
        backend: &str,
        configured_model: &str,
    ) -> Result<GenerationResponse, LLMError> {
        let choice = self
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
            usage: self.usage.map(|usage| TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            }),
            model: self.model.unwrap_or_else(|| configured_model.to_string()),
            finish_reason: FinishReason::from_wire(choice.finish_reason.as_deref()),
        })
    }
}

impl OpenAIAdapter {
    pub fn new(config: &BackendConfig, api_key: String, client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            info: ModelInfo {
                name: config.name.clone(),
                backend_kind: BackendKind::Hosted,
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
}

#[async_trait]
impl LLMProvider for OpenAIAdapter {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        let backend = self.info.name.as_str();
        let request = ChatCompletionRequest::new(Some(&self.info.model), prompt, options);
        let url = http::join_url(&self.endpoint, "chat/completions");

        info!(
            backend,
            model = self.info.model.as_str(),
            max_tokens = ?options.max_tokens,
            "Sending request to hosted chat completions API"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| http::classify_transport(backend, e))?;

        let completion: ChatCompletionResponse = http::read_json(backend, response).await?;
        debug!(backend, "Received response from hosted chat completions API");

        completion.into_generation(backend, &self.info.model)
    }

    fn model_info(&self) -> &ModelInfo {
        &self.info
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let backend = self.info.name.as_str();
        let url = http::join_url(&self.endpoint, "models");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| http::classify_transport(backend, e))?;

        http::expect_success(backend, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::ErrorKind;
    use mockito::Matcher;
    use serde_json::json;
    use std::time::Duration;

    fn adapter(endpoint: &str) -> OpenAIAdapter {
        let config = BackendConfig::new("openai", BackendKind::Hosted, endpoint, "gpt-4o-mini");
        let client = http::build_client(Duration::from_secs(5), false).unwrap();
        OpenAIAdapter::new(&config, "sk-test".to_string(), client)
    }

    fn completion_body(content: &str) -> String {
        json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_generate_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "Hello"}
                ],
                "max_tokens": 64,
                "temperature": 0.2,
                "stream": false
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body("Hi there!"))
            .create_async()
            .await;

        let options = GenerationOptions {
            max_tokens: Some(64),
            temperature: Some(0.2),
            system_prompt: Some("Be brief.".into()),
            ..Default::default()
        };
        let response = adapter(&format!("{}/v1", server.url()))
            .generate("Hello", &options)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.text, "Hi there!");
        assert_eq!(response.model, "gpt-4o-mini-2024-07-18");
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.usage.unwrap().total_tokens, 12);
    }

    #[tokio::test]
    async fn test_absent_options_are_not_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_request(|request| {
                let body: serde_json::Value =
                    serde_json::from_slice(request.body().unwrap()).unwrap();
                body.get("temperature").is_none()
                    && body.get("stop").is_none()
                    && body["messages"].as_array().map(|m| m.len()) == Some(1)
            })
            .with_status(200)
            .with_body(completion_body("ok"))
            .create_async()
            .await;

        adapter(&server.url())
            .generate("Hello", &GenerationOptions::default())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_auth_failure_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Incorrect API key provided"}}"#)
            .create_async()
            .await;

        let err = adapter(&server.url())
            .generate("Hello", &GenerationOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UpstreamRejected);
        assert!(err.to_string().contains("Incorrect API key"));
    }

    #[tokio::test]
    async fn test_server_error_and_rate_limit_are_unavailable() {
        for status in [429, 503] {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("POST", "/chat/completions")
                .with_status(status)
                .create_async()
                .await;

            let err = adapter(&server.url())
                .generate("Hello", &GenerationOptions::default())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable, "HTTP {}", status);
        }
    }

    #[tokio::test]
    async fn test_empty_or_malformed_completion_is_unavailable() {
        for body in [
            completion_body(""),
            json!({"choices": []}).to_string(),
            "not json".to_string(),
        ] {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("POST", "/chat/completions")
                .with_status(200)
                .with_body(body.clone())
                .create_async()
                .await;

            let err = adapter(&server.url())
                .generate("Hello", &GenerationOptions::default())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable, "{}", body);
        }
    }

    #[tokio::test]
    async fn test_health_check_lists_models() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/models")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_body(r#"{"data":[]}"#)
            .create_async()
            .await;

        assert!(adapter(&server.url()).health_check().await.is_ok());
    }

    #[test]
    fn test_model_info_is_static() {
        let adapter = adapter("https://api.openai.com/v1");
        let info = adapter.model_info();
        assert_eq!(info.name, "openai");
        assert_eq!(info.backend_kind, BackendKind::Hosted);
        assert_eq!(info.model, "gpt-4o-mini");
        assert!(!info.is_local);
    }
}
