// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Registry - Backend Resolution and Adapter Management
//
// Resolves a requested backend name (or the configured default) to a live
// adapter. Adapters are constructed on first use and cached for the process
// lifetime; the backend set is fixed when the registry is built.

use crate::domain::gateway_config::{BackendConfig, GatewayConfig};
use crate::domain::llm::{BackendKind, LLMError, LLMProvider, ModelInfo};
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::gigachat::GigaChatAdapter;
use super::http;
use super::local::LocalServerAdapter;
use super::openai::OpenAIAdapter;

/// Outcome of probing one backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendHealth {
    Available,
    Error(LLMError),
    /// Configured but unusable, e.g. its credentials could not be resolved
    NotConfigured(String),
}

/// Backend configuration with its credentials already resolved
struct BackendEntry {
    config: BackendConfig,
    credentials: Option<String>,
}

/// Registry for managing LLM providers and resolving backend names
pub struct ProviderRegistry {
    backends: HashMap<String, BackendEntry>,
    /// Backend names in configuration order
    order: Vec<String>,
    /// Enabled backends that could not be initialized, with the reason
    unconfigured: BTreeMap<String, String>,
    default_backend: Option<String>,
    request_timeout: Duration,
    adapters: DashMap<String, Arc<dyn LLMProvider>>,
}

impl ProviderRegistry {
    /// Create provider registry from gateway configuration.
    ///
    /// No adapter is constructed here; see [`ProviderRegistry::preload`].
    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        let mut backends = HashMap::new();
        let mut order = Vec::new();
        let mut unconfigured = BTreeMap::new();

        info!("Initializing LLM provider registry");

        for backend in &config.spec.backends {
            if !backend.enabled {
                info!("Backend '{}' disabled, skipping", backend.name);
                continue;
            }

            match Self::resolve_credentials(backend) {
                Ok(credentials) => {
                    info!(
                        "Registered backend '{}' ({}) -> {} at {}",
                        backend.name, backend.kind, backend.model, backend.endpoint
                    );
                    order.push(backend.name.clone());
                    backends.insert(
                        backend.name.clone(),
                        BackendEntry {
                            config: backend.clone(),
                            credentials,
                        },
                    );
                }
                Err(e) => {
                    warn!("Failed to initialize backend '{}': {}", backend.name, e);
                    unconfigured.insert(backend.name.clone(), e.to_string());
                }
            }
        }

        if backends.is_empty() {
            warn!("No LLM backends configured - every generation request will fail");
        }

        // Without an explicit choice, the first backend that initialized wins
        let default_backend = config
            .spec
            .selection
            .default_backend
            .clone()
            .or_else(|| order.first().cloned());
        match &default_backend {
            Some(name) if backends.contains_key(name) => info!("Default backend: {}", name),
            Some(name) => warn!("Default backend '{}' is not available", name),
            None => warn!("No default backend configured"),
        }

        Ok(Self {
            backends,
            order,
            unconfigured,
            default_backend,
            request_timeout: config.request_timeout(),
            adapters: DashMap::new(),
        })
    }

    /// An empty registry that only serves adapters added through
    /// [`ProviderRegistry::register`]
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            backends: HashMap::new(),
            order: Vec::new(),
            unconfigured: BTreeMap::new(),
            default_backend: None,
            request_timeout,
            adapters: DashMap::new(),
        }
    }

    /// Register a ready-made adapter under its `ModelInfo::name`. The first
    /// registered adapter becomes the default when none is set.
    pub fn register(&mut self, provider: Arc<dyn LLMProvider>) {
        let name = provider.model_info().name.clone();
        if !self.order.contains(&name) {
            self.order.push(name.clone());
        }
        if self.default_backend.is_none() {
            self.default_backend = Some(name.clone());
        }
        self.adapters.insert(name, provider);
    }

    pub fn with_default_backend(mut self, name: impl Into<String>) -> Self {
        self.default_backend = Some(name.into());
        self
    }

    fn resolve_credentials(backend: &BackendConfig) -> anyhow::Result<Option<String>> {
        let credentials = backend.resolve_api_key()?;
        if credentials.is_none() && backend.kind != BackendKind::Local {
            anyhow::bail!("backend of type '{}' requires an api_key", backend.kind);
        }
        Ok(credentials)
    }

    /// Resolve a backend name, or the default backend when `requested` is
    /// `None`, to its adapter. The adapter is constructed on first use.
    pub fn resolve(&self, requested: Option<&str>) -> Result<Arc<dyn LLMProvider>, LLMError> {
        let name = match requested {
            Some(name) => name,
            None => self
                .default_backend
                .as_deref()
                .ok_or_else(|| LLMError::UnknownModel("<default>".to_string()))?,
        };

        if let Some(adapter) = self.adapters.get(name) {
            return Ok(adapter.value().clone());
        }

        let entry = self.backends.get(name).ok_or_else(|| {
            if let Some(reason) = self.unconfigured.get(name) {
                warn!("Backend '{}' requested but not configured: {}", name, reason);
            }
            LLMError::UnknownModel(name.to_string())
        })?;

        let adapter = self
            .adapters
            .entry(name.to_string())
            .or_try_insert_with(|| {
                debug!("Constructing adapter for backend '{}'", name);
                Self::create_provider(entry, self.request_timeout)
            })?;

        Ok(adapter.value().clone())
    }

    /// Create a provider instance from configuration
    fn create_provider(
        entry: &BackendEntry,
        request_timeout: Duration,
    ) -> Result<Arc<dyn LLMProvider>, LLMError> {
        let config = &entry.config;
        let client = http::build_client(request_timeout, config.accept_invalid_certs).map_err(|e| {
            LLMError::unavailable(&config.name, format!("failed to build HTTP client: {}", e))
        })?;

        let provider: Arc<dyn LLMProvider> = match (config.kind, entry.credentials.clone()) {
            (BackendKind::Hosted, Some(api_key)) => Arc::new(OpenAIAdapter::new(config, api_key, client)),
            (BackendKind::Local, api_key) => Arc::new(LocalServerAdapter::new(config, api_key, client)),
            (BackendKind::GigaChat, Some(credentials)) => {
                Arc::new(GigaChatAdapter::new(config, credentials, client))
            }
            (kind, None) => {
                return Err(LLMError::rejected(
                    &config.name,
                    format!("backend of type '{}' has no credentials", kind),
                ))
            }
        };

        Ok(provider)
    }

    /// Construct every registered adapter now instead of on first use
    pub fn preload(&self) -> Result<(), LLMError> {
        for name in &self.order {
            self.resolve(Some(name))?;
        }
        info!("Preloaded {} backend adapter(s)", self.order.len());
        Ok(())
    }

    /// Usable backend names in configuration order
    pub fn backend_names(&self) -> &[String] {
        &self.order
    }

    pub fn default_backend(&self) -> Option<&str> {
        self.default_backend.as_deref()
    }

    pub fn has_backend(&self, name: &str) -> bool {
        self.order.iter().any(|n| n == name)
    }

    /// Whether the adapter for `name` has been constructed
    pub fn is_initialized(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    /// Static descriptors of every usable backend. Performs no network I/O.
    pub fn model_info_all(&self) -> Vec<ModelInfo> {
        self.order
            .iter()
            .filter_map(|name| match self.resolve(Some(name)) {
                Ok(adapter) => Some(adapter.model_info().clone()),
                Err(e) => {
                    warn!("Skipping backend '{}' in model listing: {}", name, e);
                    None
                }
            })
            .collect()
    }

    /// Probe every backend concurrently, each bounded by the request timeout
    pub async fn health_check_all(&self) -> BTreeMap<String, BackendHealth> {
        let probes = self.order.iter().map(|name| async move {
            info!("Health checking backend: {}", name);
            let health = match self.resolve(Some(name)) {
                Ok(adapter) => {
                    match tokio::time::timeout(self.request_timeout, adapter.health_check()).await {
                        Ok(Ok(())) => BackendHealth::Available,
                        Ok(Err(e)) => BackendHealth::Error(e),
                        Err(_) => BackendHealth::Error(LLMError::timeout(
                            name.as_str(),
                            format!("health check exceeded {:?}", self.request_timeout),
                        )),
                    }
                }
                Err(e) => BackendHealth::Error(e),
            };
            (name.clone(), health)
        });

        let mut results: BTreeMap<String, BackendHealth> =
            futures::future::join_all(probes).await.into_iter().collect();

        for (name, reason) in &self.unconfigured {
            results.insert(name.clone(), BackendHealth::NotConfigured(reason.clone()));
        }

        results
    }
}
