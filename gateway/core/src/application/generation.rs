// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Generation Service - Request Handler
//
// Single entry point for a generation call: validate, resolve the backend,
// apply configured defaults, run the adapter under the request deadline and
// package the result. Every failure leaves here as a classified LLMError.

use crate::domain::gateway_config::{GatewayConfig, GenerationDefaults};
use crate::domain::llm::{BackendKind, FinishReason, GenerationRequest, LLMError, TokenUsage};
use crate::infrastructure::llm::ProviderRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Uniform output of a successful generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub metadata: GenerationMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Configured backend name that served the request
    pub backend: String,
    pub backend_kind: BackendKind,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    pub finish_reason: FinishReason,
    pub latency_ms: u64,
}

pub struct GenerationService {
    registry: Arc<ProviderRegistry>,
    defaults: GenerationDefaults,
    request_timeout: Duration,
}

impl GenerationService {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        defaults: GenerationDefaults,
        request_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            defaults,
            request_timeout,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        let registry = ProviderRegistry::from_config(config)?;
        Ok(Self::new(
            Arc::new(registry),
            config.spec.defaults,
            config.request_timeout(),
        ))
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub async fn handle(&self, request: GenerationRequest) -> Result<GenerationResult, LLMError> {
        request.validate()?;

        let adapter = self.registry.resolve(request.model.as_deref())?;
        let info = adapter.model_info();
        let backend = info.name.clone();
        let options = request
            .options
            .with_defaults(self.defaults.max_tokens, self.defaults.temperature);

        info!(
            backend = backend.as_str(),
            backend_kind = %info.backend_kind,
            prompt_chars = request.prompt.chars().count(),
            "Handling generation request"
        );

        let started = Instant::now();
        // Dropping the adapter future on expiry aborts the in-flight HTTP call
        let outcome = match tokio::time::timeout(
            self.request_timeout,
            adapter.generate(&request.prompt, &options),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LLMError::timeout(
                backend.as_str(),
                format!("no response within {:?}", self.request_timeout),
            )),
        }
        .and_then(|response| {
            if response.text.trim().is_empty() {
                Err(LLMError::unavailable(backend.as_str(), "backend returned an empty completion"))
            } else {
                Ok(response)
            }
        });
        let elapsed = started.elapsed();

        let outcome_label = match &outcome {
            Ok(_) => "success",
            Err(e) => e.kind().as_str(),
        };
        metrics::counter!(
            "llm_gateway_requests_total",
            "backend" => backend.clone(),
            "outcome" => outcome_label
        )
        .increment(1);
        metrics::histogram!("llm_gateway_request_duration_seconds", "backend" => backend.clone())
            .record(elapsed.as_secs_f64());

        match outcome {
            Ok(response) => {
                info!(
                    backend = backend.as_str(),
                    latency_ms = elapsed.as_millis() as u64,
                    "Generation succeeded"
                );
                Ok(GenerationResult {
                    text: response.text,
                    metadata: GenerationMetadata {
                        backend,
                        backend_kind: info.backend_kind,
                        model: response.model,
                        usage: response.usage,
                        finish_reason: response.finish_reason,
                        latency_ms: elapsed.as_millis() as u64,
                    },
                })
            }
            Err(e) => {
                if e.kind().is_retryable() {
                    warn!(backend = backend.as_str(), kind = %e.kind(), "Generation failed: {}", e);
                } else {
                    error!(backend = backend.as_str(), kind = %e.kind(), "Generation failed: {}", e);
                }
                Err(e)
            }
        }
    }
}
