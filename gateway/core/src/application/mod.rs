// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod generation;

pub use generation::{GenerationMetadata, GenerationResult, GenerationService};
