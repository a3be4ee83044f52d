// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! LLM Gateway Core
//!
//! One uniform `generate` contract in front of several heterogeneous
//! chat-completion backends.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Request handler → provider registry → backend adapter

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
