// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Send a prompt to a running gateway

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use crate::client::{GatewayClient, GenerateBody};

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Prompt text
    pub prompt: String,

    /// Backend name (default: the gateway's default backend)
    #[arg(short, long)]
    pub model: Option<String>,

    /// System prompt sent ahead of the user prompt
    #[arg(short, long)]
    pub system: Option<String>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    #[arg(long)]
    pub temperature: Option<f32>,

    /// Print the raw JSON response
    #[arg(long)]
    pub json: bool,
}

pub async fn run(url: &str, args: GenerateArgs) -> Result<()> {
    let client = GatewayClient::new(url)?;
    let body = GenerateBody {
        prompt: args.prompt,
        model: args.model,
        system_prompt: args.system,
        max_tokens: args.max_tokens,
        temperature: args.temperature,
    };

    let response = client.generate(&body).await?;

    if args.json {
        let json = serde_json::to_string_pretty(&response).context("Failed to encode response")?;
        println!("{}", json);
        return Ok(());
    }

    println!("{}", response.text);
    println!();

    let metadata = &response.metadata;
    let mut summary = format!(
        "{} ({}) · {} · {} ms",
        metadata.backend, metadata.backend_kind, metadata.model, metadata.latency_ms
    );
    if let Some(usage) = &metadata.usage {
        summary.push_str(&format!(
            " · {} prompt + {} completion tokens",
            usage.prompt_tokens, usage.completion_tokens
        ));
    }
    println!("{}", summary.dimmed());

    Ok(())
}
