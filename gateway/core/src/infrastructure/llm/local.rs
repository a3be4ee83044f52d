// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Local Model Server Adapter
//
// Anti-Corruption Layer for OpenAI-compatible servers on a configurable
// host:port (LM Studio, vLLM, llama.cpp server). No credentials are required;
// a bearer token is sent only when one is configured.

use crate::domain::gateway_config::BackendConfig;
use crate::domain::llm::{
    BackendKind, GenerationOptions, GenerationResponse, LLMError, LLMProvider, ModelCapabilities,
    ModelInfo,
};
use async_trait::async_trait;
use tracing::{debug, info};

use super::http;
use super::openai::{ChatCompletionRequest, ChatCompletionResponse};

pub struct LocalServerAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    info: ModelInfo,
}

impl LocalServerAdapter {
    pub fn new(config: &BackendConfig, api_key: Option<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            info: ModelInfo {
                name: config.name.clone(),
                backend_kind: BackendKind::Local,
                model: config.model.clone(),
                endpoint: config.endpoint.clone(),
                is_local: true,
                capabilities: ModelCapabilities {
                    streaming: true,
                    context_window: config.context_window,
                },
            },
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl LLMProvider for LocalServerAdapter {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        let backend = self.info.name.as_str();
        let mut request = ChatCompletionRequest::new(Some(&self.info.model), prompt, options);
        // vLLM and llama.cpp accept repetition_penalty as an extension field
        request.repetition_penalty = options.repetition_penalty;
        let url = http::join_url(&self.endpoint, "chat/completions");

        info!(
            backend,
            endpoint = self.endpoint.as_str(),
            model = self.info.model.as_str(),
            "Sending request to local model server"
        );

        let response = self
            .authorize(self.client.post(&url))
            .json(&request)
            .send()
            .await
            .map_err(|e| http::classify_transport(backend, e))?;

        let completion: ChatCompletionResponse = http::read_json(backend, response).await?;
        debug!(backend, "Received response from local model server");

        completion.into_generation(backend, &self.info.model)
    }

    fn model_info(&self) -> &ModelInfo {
        &self.info
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let backend = self.info.name.as_str();
        let url = http::join_url(&self.endpoint, "models");

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| http::classify_transport(backend, e))?;

        http::expect_success(backend, response).await
    }
}
