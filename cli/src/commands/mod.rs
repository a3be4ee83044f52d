// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the llm-gateway CLI

pub mod config;
pub mod generate;
pub mod serve;
pub mod status;

pub use self::config::ConfigCommand;
pub use self::generate::GenerateArgs;
pub use self::serve::ServeArgs;
