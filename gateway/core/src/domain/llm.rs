// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Llm
//!
//! Backend-agnostic generation contract shared by every adapter.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Defines the `LLMProvider` port, the request/result shapes and
//!   the failure taxonomy callers use to decide between retrying and failing

// LLM Provider Domain Interface (Anti-Corruption Layer)
//
// Adapters in infrastructure/llm/ translate this contract into one backend's
// wire protocol. Nothing in this module performs I/O.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain interface for LLM backends
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Send `prompt` to the backend and wait for the complete completion.
    ///
    /// On success the returned text is exactly the backend's completion with
    /// no adapter-added framing.
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError>;

    /// Static descriptor fixed at construction. Never performs I/O.
    fn model_info(&self) -> &ModelInfo;

    /// Check if the backend is reachable and accepts our credentials
    async fn health_check(&self) -> Result<(), LLMError>;
}

/// The closed set of wire protocols the gateway speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// OpenAI-style chat completions on a hosted API (OpenAI, DeepSeek, ...)
    Hosted,
    /// OpenAI-compatible server on a configurable host:port (LM Studio, vLLM)
    Local,
    /// GigaChat: OAuth token exchange followed by its own chat payload
    GigaChat,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Hosted => "hosted",
            BackendKind::Local => "local",
            BackendKind::GigaChat => "gigachat",
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, BackendKind::Local)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for LLM generation
///
/// Every field is optional; adapters omit absent values from their payloads
/// so the backend applies its own defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 = deterministic, 2.0 = most random)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling mass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    /// Sequences that stop generation
    #[serde(default, alias = "stop", skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,

    /// Sent as a leading `system` message when non-empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl GenerationOptions {
    /// Fill `max_tokens` and `temperature` from configured defaults when the
    /// caller left them out.
    pub fn with_defaults(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens.get_or_insert(max_tokens);
        self.temperature.get_or_insert(temperature);
        self
    }

    /// Non-blank system prompt, if any
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt
            .as_deref()
            .filter(|prompt| !prompt.trim().is_empty())
    }

    pub fn validate(&self) -> Result<(), LLMError> {
        if self.max_tokens == Some(0) {
            return Err(LLMError::InvalidRequest(
                "max_tokens must be a positive integer".into(),
            ));
        }

        if let Some(temperature) = self.temperature {
            if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
                return Err(LLMError::InvalidRequest(format!(
                    "temperature must be between 0.0 and 2.0, got {}",
                    temperature
                )));
            }
        }

        if let Some(top_p) = self.top_p {
            if !top_p.is_finite() || top_p <= 0.0 || top_p > 1.0 {
                return Err(LLMError::InvalidRequest(format!(
                    "top_p must be in (0.0, 1.0], got {}",
                    top_p
                )));
            }
        }

        Ok(())
    }
}

/// Uniform input crossing the gateway boundary
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,

    /// Configured backend name; `None` selects the default backend
    pub model: Option<String>,

    pub options: GenerationOptions,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            options: GenerationOptions::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Reject malformed caller input before it reaches an adapter
    pub fn validate(&self) -> Result<(), LLMError> {
        if self.prompt.trim().is_empty() {
            return Err(LLMError::InvalidRequest("prompt cannot be empty".into()));
        }

        if let Some(model) = &self.model {
            if model.trim().is_empty() {
                return Err(LLMError::InvalidRequest("model cannot be blank".into()));
            }
        }

        self.options.validate()
    }
}

/// What an adapter hands back for one successful call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResponse {
    /// Generated text
    pub text: String,

    /// Token usage stats, when the backend reports them
    pub usage: Option<TokenUsage>,

    /// Model that served the request (as reported by the backend when present)
    pub model: String,

    /// Why generation stopped
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason why generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural completion (model decided to stop)
    Stop,

    /// Hit max_tokens limit
    Length,

    /// Blocked by content filter
    ContentFilter,
}

impl FinishReason {
    /// Map a backend's `finish_reason` string. Unknown values count as a
    /// natural stop.
    pub fn from_wire(reason: Option<&str>) -> Self {
        match reason {
            Some("length") => FinishReason::Length,
            // GigaChat reports filtered output as "blacklist"
            Some("content_filter") | Some("blacklist") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        }
    }
}

/// Static descriptor of a configured backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Configured backend name (the value callers pass as `model`)
    pub name: String,

    pub backend_kind: BackendKind,

    /// Model identifier sent to the backend
    pub model: String,

    pub endpoint: String,

    pub is_local: bool,

    pub capabilities: ModelCapabilities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    /// Whether the backend can stream (the gateway itself always waits for
    /// the complete response)
    pub streaming: bool,

    /// Maximum context window in tokens
    pub context_window: u32,
}

/// Failure kinds visible to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UpstreamUnavailable,
    UpstreamTimeout,
    UpstreamRejected,
    UnknownModel,
    InvalidRequest,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UpstreamUnavailable => "UpstreamUnavailable",
            ErrorKind::UpstreamTimeout => "UpstreamTimeout",
            ErrorKind::UpstreamRejected => "UpstreamRejected",
            ErrorKind::UnknownModel => "UnknownModel",
            ErrorKind::InvalidRequest => "InvalidRequest",
        }
    }

    /// Whether repeating the same request later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::UpstreamUnavailable | ErrorKind::UpstreamTimeout
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during LLM operations
///
/// Every failure is classified into exactly one variant.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LLMError {
    #[error("backend '{backend}' is unavailable: {reason}")]
    UpstreamUnavailable { backend: String, reason: String },

    #[error("backend '{backend}' timed out: {reason}")]
    UpstreamTimeout { backend: String, reason: String },

    #[error("backend '{backend}' rejected the request: {reason}")]
    UpstreamRejected { backend: String, reason: String },

    #[error("unknown model '{0}'")]
    UnknownModel(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl LLMError {
    pub fn unavailable(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    pub fn timeout(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UpstreamTimeout {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    pub fn rejected(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UpstreamRejected {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LLMError::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            LLMError::UpstreamTimeout { .. } => ErrorKind::UpstreamTimeout,
            LLMError::UpstreamRejected { .. } => ErrorKind::UpstreamRejected,
            LLMError::UnknownModel(_) => ErrorKind::UnknownModel,
            LLMError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }
}
