// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`llm-gateway-core`)
//!
//! HTTP surface that translates external requests into application service
//! calls. No generation logic lives here; the handlers delegate to
//! [`crate::application::generation::GenerationService`] and map its
//! classified failures to status codes.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP (Axum) | `/generate`, `/health`, `/available_models` |

pub mod api;
