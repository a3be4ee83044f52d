// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # LLM Gateway
//!
//! The `llm-gateway` binary serves one uniform generation API in front of
//! several chat-completion backends and talks to a running gateway.
//!
//! ## Commands
//!
//! - `llm-gateway serve` - Start the HTTP gateway
//! - `llm-gateway generate <PROMPT>` - Send a prompt to a running gateway
//! - `llm-gateway models` / `llm-gateway health` - Inspect a running gateway
//! - `llm-gateway config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use llm_gateway::commands::{self, ConfigCommand, GenerateArgs, ServeArgs};
use llm_gateway_core::domain::gateway_config::GatewayConfig;

/// LLM Gateway - one generation API for hosted, local and GigaChat backends
#[derive(Parser)]
#[command(name = "llm-gateway")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "LLM_GATEWAY_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Base URL of a running gateway (client commands)
    #[arg(
        long,
        global = true,
        env = "LLM_GATEWAY_URL",
        default_value = "http://127.0.0.1:8003"
    )]
    url: String,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true, env = "LLM_GATEWAY_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    #[command(name = "serve")]
    Serve(ServeArgs),

    /// Send a prompt to a running gateway
    #[command(name = "generate")]
    Generate(GenerateArgs),

    /// List the backends of a running gateway
    #[command(name = "models")]
    Models,

    /// Probe the backends of a running gateway
    #[command(name = "health")]
    Health,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is not an error
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve(args)) => {
            let config = GatewayConfig::load_or_default(cli.config)
                .context("Failed to load configuration")?;
            let logging = &config.spec.observability.logging;
            let level = cli.log_level.as_deref().unwrap_or(&logging.level);
            init_logging(level, &logging.format)?;

            if let Ok(path) = dotenv {
                info!("Loaded environment from {}", path.display());
            }

            commands::serve::run(config, args).await
        }
        Some(Commands::Generate(args)) => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), "text")?;
            commands::generate::run(&cli.url, args).await
        }
        Some(Commands::Models) => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), "text")?;
            commands::status::models(&cli.url).await
        }
        Some(Commands::Health) => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), "text")?;
            commands::status::health(&cli.url).await
        }
        Some(Commands::Config { command }) => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), "text")?;
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if format == "json" {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
