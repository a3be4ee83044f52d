// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gateway HTTP server

use anyhow::{Context, Result};
use clap::Args;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use llm_gateway_core::application::GenerationService;
use llm_gateway_core::domain::gateway_config::GatewayConfig;
use llm_gateway_core::presentation::api::app;

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Bind address (default: network.bind_address from config)
    #[arg(long, env = "LLM_GATEWAY_HOST")]
    pub host: Option<String>,

    /// HTTP API port (default: network.port from config)
    #[arg(long, env = "LLM_GATEWAY_PORT")]
    pub port: Option<u16>,

    /// Construct every backend adapter at startup
    #[arg(long)]
    pub preload: bool,
}

pub async fn run(mut config: GatewayConfig, args: ServeArgs) -> Result<()> {
    if let Some(host) = args.host {
        config.spec.network.bind_address = host;
    }
    if let Some(port) = args.port {
        config.spec.network.port = port;
    }

    config
        .validate()
        .context("Configuration validation failed")?;

    info!(
        "Configuration loaded: gateway={} backends={} timeout={}s",
        config.metadata.name,
        config.spec.backends.len(),
        config.spec.request_timeout_secs
    );

    let metrics = &config.spec.observability.metrics;
    if metrics.enabled {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], metrics.port))
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Prometheus metrics exposed on port {}", metrics.port);
    }

    let service = Arc::new(
        GenerationService::from_config(&config).context("Failed to initialize LLM backends")?,
    );

    if args.preload || config.spec.selection.preload {
        service
            .registry()
            .preload()
            .context("Failed to preload backend adapters")?;
    }

    let addr: SocketAddr = format!(
        "{}:{}",
        config.spec.network.bind_address, config.spec.network.port
    )
    .parse()
    .with_context(|| {
        format!(
            "Invalid bind address {}:{}",
            config.spec.network.bind_address, config.spec.network.port
        )
    })?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("LLM gateway listening on {}", addr);

    axum::serve(listener, app(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("LLM gateway shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
