// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each adapter translates between the domain `LLMProvider` interface and one
// backend's wire protocol.

pub mod gigachat;
pub mod http;
pub mod local;
pub mod openai;
pub mod registry;

pub use gigachat::GigaChatAdapter;
pub use local::LocalServerAdapter;
pub use openai::OpenAIAdapter;
pub use registry::{BackendHealth, ProviderRegistry};
