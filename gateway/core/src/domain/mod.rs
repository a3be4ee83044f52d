// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Backend-agnostic types shared by every layer.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Generation contract, failure taxonomy and gateway configuration

pub mod gateway_config;
pub mod llm;
