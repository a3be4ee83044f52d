// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use llm_gateway_core::domain::gateway_config::{
    BackendConfig, GatewayConfig, DEFAULT_DEEPSEEK_ENDPOINT, DEFAULT_DEEPSEEK_MODEL,
    DEFAULT_GIGACHAT_AUTH_URL, DEFAULT_GIGACHAT_ENDPOINT, DEFAULT_GIGACHAT_MODEL,
    DEFAULT_GIGACHAT_SCOPE, DEFAULT_LOCAL_ENDPOINT, DEFAULT_LOCAL_MODEL, DEFAULT_OPENAI_ENDPOINT,
    DEFAULT_OPENAI_MODEL,
};
use llm_gateway_core::domain::llm::BackendKind;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./llm-gateway.yaml)
        #[arg(short, long, default_value = "./llm-gateway.yaml")]
        output: PathBuf,

        /// Include every supported backend
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(&output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = GatewayConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. LLM_GATEWAY_CONFIG_PATH: {}",
            std::env::var("LLM_GATEWAY_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./llm-gateway.yaml");
        println!("  4. ~/.llm-gateway/config.yaml");
        println!("  5. /etc/llm-gateway/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Gateway:".bold());
    println!("  Name: {}", config.metadata.name);
    println!(
        "  Listen: {}:{}",
        config.spec.network.bind_address, config.spec.network.port
    );
    println!("  Request timeout: {}s", config.spec.request_timeout_secs);
    println!();

    println!("{}", "Backends:".bold());
    if config.spec.backends.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for backend in &config.spec.backends {
        let state = if backend.enabled {
            "enabled".green()
        } else {
            "disabled".dimmed()
        };
        println!("  {} ({}) {}", backend.name.bold(), backend.kind, state);
        println!("    Endpoint: {}", backend.endpoint);
        println!("    Model: {}", backend.model);
        println!("    Credentials: {}", describe_secret(backend.api_key.as_deref()));
        if let Some(scope) = &backend.scope {
            println!("    Scope: {}", scope);
        }
    }
    println!();

    println!("{}", "Selection:".bold());
    println!(
        "  Default backend: {}",
        config.default_backend().unwrap_or("(none)")
    );
    println!("  Preload: {}", config.spec.selection.preload);
    println!(
        "  Defaults: max_tokens={} temperature={}",
        config.spec.defaults.max_tokens, config.spec.defaults.temperature
    );
    println!();

    Ok(())
}

/// Never print secrets; only say where they come from
fn describe_secret(value: Option<&str>) -> String {
    match value {
        None | Some("") => "(none)".to_string(),
        Some(key) if key.starts_with("env:") => format!("from ${}", &key["env:".len()..]),
        Some(_) => "(set)".to_string(),
    }
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = GatewayConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

/// Sample manifest: the local server only, or every supported backend
pub fn sample_config(with_examples: bool) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.metadata.name = "llm-gateway".to_string();

    let local = BackendConfig::new("local", BackendKind::Local, DEFAULT_LOCAL_ENDPOINT, DEFAULT_LOCAL_MODEL);

    if !with_examples {
        config.spec.backends = vec![local];
        return config;
    }

    let mut gigachat = BackendConfig::new(
        "gigachat",
        BackendKind::GigaChat,
        DEFAULT_GIGACHAT_ENDPOINT,
        DEFAULT_GIGACHAT_MODEL,
    )
    .with_api_key("env:GIGACHAT_CREDENTIALS");
    gigachat.scope = Some(DEFAULT_GIGACHAT_SCOPE.to_string());
    gigachat.auth_url = Some(DEFAULT_GIGACHAT_AUTH_URL.to_string());
    gigachat.accept_invalid_certs = true;

    config.spec.backends = vec![
        BackendConfig::new("openai", BackendKind::Hosted, DEFAULT_OPENAI_ENDPOINT, DEFAULT_OPENAI_MODEL)
            .with_api_key("env:OPENAI_API_KEY"),
        BackendConfig::new("deepseek", BackendKind::Hosted, DEFAULT_DEEPSEEK_ENDPOINT, DEFAULT_DEEPSEEK_MODEL)
            .with_api_key("env:DEEPSEEK_API_KEY"),
        local,
        gigachat,
    ];
    config.spec.selection.default_backend = Some("openai".to_string());
    config
}

async fn generate(output: &Path, with_examples: bool) -> Result<()> {
    sample_config(with_examples)
        .to_yaml_file(output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
