// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Inspect the backends of a running gateway

use anyhow::Result;
use colored::Colorize;

use crate::client::GatewayClient;

pub async fn models(url: &str) -> Result<()> {
    let models = GatewayClient::new(url)?.available_models().await?;

    if models.is_empty() {
        println!("{}", "No backends configured".yellow());
        return Ok(());
    }

    println!("{}", "Available backends:".bold());
    for (name, info) in &models {
        let location = if info.is_local { "local" } else { "remote" };
        println!("  {} ({}, {})", name.bold(), info.backend_kind, location);
        println!("    Model: {}", info.model);
        println!("    Endpoint: {}", info.endpoint);
        println!("    Context window: {}", info.capabilities.context_window);
    }

    Ok(())
}

pub async fn health(url: &str) -> Result<()> {
    let health = GatewayClient::new(url)?.health().await?;

    println!(
        "Gateway: {}",
        health["status"].as_str().unwrap_or("unknown").green()
    );
    if let Some(default) = health["default_backend"].as_str() {
        println!("Default backend: {}", default);
    }
    println!();

    let Some(backends) = health["backends"].as_object() else {
        return Ok(());
    };

    for (name, entry) in backends {
        let status = entry["status"].as_str().unwrap_or("unknown");
        let label = match status {
            "available" => status.green(),
            "not_configured" => status.yellow(),
            _ => status.red(),
        };
        print!("  {:<12} {}", name, label);
        if let Some(error) = entry["error"].as_str() {
            print!("  {}", error.dimmed());
        }
        println!();
    }

    Ok(())
}
