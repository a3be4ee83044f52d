// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Gateway Configuration Types
//
// Defines the configuration schema for an LLM gateway process:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Backend list (one adapter per entry)
// - Default backend selection and generation defaults
// - Request deadline, network and observability settings
//
// Configuration is read once at startup and is immutable afterwards.

use crate::domain::llm::BackendKind;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "100monkeys.ai/v1";
pub const KIND: &str = "GatewayConfig";

pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-2024-11-20";
pub const DEFAULT_DEEPSEEK_ENDPOINT: &str = "http://localhost:8000/v1";
pub const DEFAULT_DEEPSEEK_MODEL: &str = "deepseek-chat";
pub const DEFAULT_LOCAL_ENDPOINT: &str = "http://localhost:1234/v1";
pub const DEFAULT_LOCAL_MODEL: &str = "local-model";
pub const DEFAULT_GIGACHAT_ENDPOINT: &str = "https://gigachat.devices.sberbank.ru/api/v1";
pub const DEFAULT_GIGACHAT_AUTH_URL: &str = "https://ngw.devices.sberbank.ru:9443/api/v2/oauth";
pub const DEFAULT_GIGACHAT_SCOPE: &str = "GIGACHAT_API_PERS";
pub const DEFAULT_GIGACHAT_MODEL: &str = "GigaChat";

/// Hosted backends that can be registered from the environment alone:
/// (name, api key var, base url var, model var, default endpoint, default model)
const HOSTED_PRESETS: [(&str, &str, &str, &str, &str, &str); 2] = [
    (
        "openai",
        "OPENAI_API_KEY",
        "OPENAI_API_BASE",
        "OPENAI_MODEL",
        DEFAULT_OPENAI_ENDPOINT,
        DEFAULT_OPENAI_MODEL,
    ),
    (
        "deepseek",
        "DEEPSEEK_API_KEY",
        "DEEPSEEK_API_BASE",
        "DEEPSEEK_MODEL",
        DEFAULT_DEEPSEEK_ENDPOINT,
        DEFAULT_DEEPSEEK_MODEL,
    ),
];

/// Top-level Kubernetes-style gateway configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// API version (must be "100monkeys.ai/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "GatewayConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: GatewayConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable gateway name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Gateway configuration specification (content under spec:)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfigSpec {
    /// Backend configurations, in priority order
    #[serde(default)]
    pub backends: Vec<BackendConfig>,

    #[serde(default)]
    pub selection: BackendSelection,

    #[serde(default)]
    pub defaults: GenerationDefaults,

    /// Deadline for one complete backend call, token exchange included
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Unique backend name; callers select it through the `model` field
    pub name: String,

    /// Wire protocol
    #[serde(rename = "type")]
    pub kind: BackendKind,

    /// Base URL; `/chat/completions` is appended
    pub endpoint: String,

    /// API key, or the base64 authorization key for gigachat.
    /// Supports "env:VAR_NAME" indirection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier sent to the backend
    pub model: String,

    /// OAuth scope (gigachat only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// OAuth token endpoint (gigachat only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub accept_invalid_certs: bool,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum context window in tokens, reported through model info
    #[serde(default = "default_context_window")]
    pub context_window: u32,
}

impl BackendConfig {
    pub fn new(
        name: impl Into<String>,
        kind: BackendKind,
        endpoint: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            endpoint: endpoint.into(),
            api_key: None,
            model: model.into(),
            scope: None,
            auth_url: None,
            accept_invalid_certs: false,
            enabled: true,
            context_window: default_context_window(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Resolve the API key (supports "env:VAR_NAME" syntax)
    pub fn resolve_api_key(&self) -> anyhow::Result<Option<String>> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if key.starts_with("env:") => {
                let var_name = &key["env:".len()..];
                let value = std::env::var(var_name).map_err(|_| {
                    anyhow::anyhow!(
                        "Environment variable not set: {} (backend '{}')",
                        var_name,
                        self.name
                    )
                })?;
                Ok(Some(value))
            }
            Some("") | None => Ok(None),
            Some(key) => Ok(Some(key.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendSelection {
    /// Backend used when a request names none. Falls back to the first
    /// enabled backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_backend: Option<String>,

    /// Construct every adapter at startup instead of on first use
    #[serde(default)]
    pub preload: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationDefaults {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network bind address (e.g. "0.0.0.0" or "127.0.0.1")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP API port
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus exposition
    #[serde(default)]
    pub enabled: bool,

    /// Metrics endpoint port
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_context_window() -> u32 {
    8192
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn default_request_timeout() -> u64 {
    120
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8003
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Default for GatewayConfigSpec {
    fn default() -> Self {
        Self {
            backends: vec![],
            selection: BackendSelection::default(),
            defaults: GenerationDefaults::default(),
            request_timeout_secs: default_request_timeout(),
            network: NetworkConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "llm-gateway".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: GatewayConfigSpec::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. LLM_GATEWAY_CONFIG_PATH environment variable
    /// 2. ./llm-gateway.yaml (working directory)
    /// 3. ~/.llm-gateway/config.yaml (user home)
    /// 4. /etc/llm-gateway/config.yaml (system, Unix) or C:\ProgramData\LlmGateway\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("LLM_GATEWAY_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./llm-gateway.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".llm-gateway").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/llm-gateway/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\LlmGateway\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // 1. Explicit CLI path (Fail if missing/invalid)
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        // 2. Discovery (Env -> Cwd -> Home -> System)
        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::info!("No configuration file found, building backends from environment");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply process environment overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key/value source.
    ///
    /// Each recognized key maps to exactly one field. A backend preset is
    /// registered when its credential key is present; keys for a backend
    /// that ends up unregistered are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        for (name, key_var, base_var, model_var, endpoint, model) in HOSTED_PRESETS {
            let api_key = get(key_var);
            if api_key.is_none() && self.backend(name).is_none() {
                tracing::debug!(backend = name, "Backend not configured");
                continue;
            }
            let backend = self.upsert_backend(name, BackendKind::Hosted, endpoint, model);
            if let Some(api_key) = api_key {
                backend.api_key = Some(api_key);
            }
            if let Some(endpoint) = get(base_var) {
                backend.endpoint = endpoint;
            }
            if let Some(model) = get(model_var) {
                backend.model = model;
            }
        }

        let credentials = get("GIGACHAT_CREDENTIALS");
        if credentials.is_some() || self.backend("gigachat").is_some() {
            let backend = self.upsert_backend(
                "gigachat",
                BackendKind::GigaChat,
                DEFAULT_GIGACHAT_ENDPOINT,
                DEFAULT_GIGACHAT_MODEL,
            );
            if let Some(credentials) = credentials {
                backend.api_key = Some(credentials);
            }
            if let Some(scope) = get("GIGACHAT_SCOPE") {
                backend.scope = Some(scope);
            }
            if let Some(model) = get("GIGACHAT_MODEL") {
                backend.model = model;
            }
            if let Some(auth_url) = get("GIGACHAT_AUTH_URL") {
                backend.auth_url = Some(auth_url);
            }
            if let Some(endpoint) = get("GIGACHAT_API_BASE") {
                backend.endpoint = endpoint;
            }
            if let Some(verify) = get("GIGACHAT_VERIFY_SSL").and_then(|v| parse_bool("GIGACHAT_VERIFY_SSL", &v)) {
                backend.accept_invalid_certs = !verify;
            }
        }

        // The local server needs no credentials, so it is registered when
        // pointed at explicitly or when nothing else is configured.
        let local_url = get("LM_STUDIO_URL");
        if local_url.is_some() || self.backend("local").is_some() || self.spec.backends.is_empty() {
            let backend = self.upsert_backend(
                "local",
                BackendKind::Local,
                DEFAULT_LOCAL_ENDPOINT,
                DEFAULT_LOCAL_MODEL,
            );
            if let Some(endpoint) = local_url {
                backend.endpoint = endpoint;
            }
            if let Some(model) = get("LOCAL_MODEL") {
                backend.model = model;
            }
        }

        if let Some(name) = get("LLM_GATEWAY_DEFAULT_BACKEND") {
            tracing::info!("Environment override: LLM_GATEWAY_DEFAULT_BACKEND={}", name);
            self.spec.selection.default_backend = Some(name);
        }

        if let Some(val) = get("LLM_GATEWAY_DEFAULT_MAX_TOKENS") {
            match val.parse::<u32>() {
                Ok(max_tokens) => self.spec.defaults.max_tokens = max_tokens,
                Err(_) => tracing::warn!(
                    "Invalid value for LLM_GATEWAY_DEFAULT_MAX_TOKENS: '{}'. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = get("LLM_GATEWAY_DEFAULT_TEMPERATURE") {
            match val.parse::<f32>() {
                Ok(temperature) => self.spec.defaults.temperature = temperature,
                Err(_) => tracing::warn!(
                    "Invalid value for LLM_GATEWAY_DEFAULT_TEMPERATURE: '{}'. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = get("LLM_GATEWAY_REQUEST_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => self.spec.request_timeout_secs = secs,
                Err(_) => tracing::warn!(
                    "Invalid value for LLM_GATEWAY_REQUEST_TIMEOUT_SECS: '{}'. Ignoring.",
                    val
                ),
            }
        }
    }

    pub fn backend(&self, name: &str) -> Option<&BackendConfig> {
        self.spec.backends.iter().find(|b| b.name == name)
    }

    fn upsert_backend(
        &mut self,
        name: &str,
        kind: BackendKind,
        endpoint: &str,
        model: &str,
    ) -> &mut BackendConfig {
        let index = match self.spec.backends.iter().position(|b| b.name == name) {
            Some(index) => index,
            None => {
                self.spec
                    .backends
                    .push(BackendConfig::new(name, kind, endpoint, model));
                self.spec.backends.len() - 1
            }
        };
        &mut self.spec.backends[index]
    }

    /// Name of the backend used when a request names none
    pub fn default_backend(&self) -> Option<&str> {
        self.spec
            .selection
            .default_backend
            .as_deref()
            .or_else(|| {
                self.spec
                    .backends
                    .iter()
                    .find(|b| b.enabled)
                    .map(|b| b.name.as_str())
            })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.spec.request_timeout_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.request_timeout_secs == 0 {
            anyhow::bail!("spec.request_timeout_secs must be greater than zero");
        }

        let mut seen = std::collections::HashSet::new();
        for backend in &self.spec.backends {
            if backend.name.trim().is_empty() {
                anyhow::bail!("Backend name cannot be empty");
            }

            if !seen.insert(backend.name.as_str()) {
                anyhow::bail!("Duplicate backend name: {}", backend.name);
            }

            if backend.endpoint.trim().is_empty() {
                anyhow::bail!("Backend endpoint cannot be empty for: {}", backend.name);
            }
            check_url(&backend.name, "endpoint", &backend.endpoint)?;
            if let Some(auth_url) = &backend.auth_url {
                check_url(&backend.name, "auth_url", auth_url)?;
            }

            if backend.model.trim().is_empty() {
                anyhow::bail!("Backend model cannot be empty for: {}", backend.name);
            }

            if backend.enabled
                && matches!(backend.kind, BackendKind::Hosted | BackendKind::GigaChat)
                && backend.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
            {
                anyhow::bail!(
                    "Backend '{}' of type '{}' requires an api_key",
                    backend.name,
                    backend.kind
                );
            }
        }

        if let Some(default_backend) = &self.spec.selection.default_backend {
            if !self
                .spec
                .backends
                .iter()
                .any(|b| &b.name == default_backend && b.enabled)
            {
                anyhow::bail!(
                    "Default backend '{}' not found among enabled backends",
                    default_backend
                );
            }
        }

        let defaults = &self.spec.defaults;
        if defaults.max_tokens == 0 {
            anyhow::bail!("spec.defaults.max_tokens must be greater than zero");
        }
        if !(0.0..=2.0).contains(&defaults.temperature) {
            anyhow::bail!(
                "spec.defaults.temperature must be between 0.0 and 2.0, got {}",
                defaults.temperature
            );
        }

        match self.spec.observability.logging.format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("Unsupported log format: '{}'. Use 'json' or 'text'", other),
        }

        Ok(())
    }
}

/// Backend URLs must be absolute http(s) URLs
fn check_url(backend: &str, field: &str, value: &str) -> anyhow::Result<()> {
    let url = reqwest::Url::parse(value).with_context(|| {
        format!("Backend '{}' has an invalid {}: '{}'", backend, field, value)
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!(
            "Backend '{}' {} must use http or https, got '{}'",
            backend,
            field,
            value
        );
    }
    Ok(())
}

fn parse_bool(key: &str, val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!(
                "Invalid value for {}: '{}'. Expected true/false. Ignoring.",
                key,
                val
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_manifest() {
        let manifest = GatewayConfig::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert!(!manifest.metadata.name.is_empty());
        assert!(manifest.spec.backends.is_empty());
        assert_eq!(manifest.spec.network.port, 8003);
        assert_eq!(manifest.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
apiVersion: 100monkeys.ai/v1
kind: GatewayConfig
metadata:
  name: test-gateway
spec:
  backends:
    - name: hosted
      type: hosted
      endpoint: https://api.openai.com/v1
      api_key: sk-test
      model: gpt-4o-mini
    - name: gigachat
      type: gigachat
      endpoint: https://gigachat.devices.sberbank.ru/api/v1
      api_key: env:GIGACHAT_CREDENTIALS
      model: GigaChat
      scope: GIGACHAT_API_CORP
      accept_invalid_certs: true
  selection:
    default_backend: hosted
  request_timeout_secs: 30
"#;
        let config = GatewayConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.metadata.name, "test-gateway");
        assert_eq!(config.spec.backends.len(), 2);
        assert_eq!(config.spec.backends[0].kind, BackendKind::Hosted);
        assert!(config.spec.backends[0].enabled);
        assert_eq!(config.spec.backends[1].kind, BackendKind::GigaChat);
        assert_eq!(config.spec.backends[1].scope.as_deref(), Some("GIGACHAT_API_CORP"));
        assert!(config.spec.backends[1].accept_invalid_certs);
        assert_eq!(config.default_backend(), Some("hosted"));
        assert_eq!(config.spec.defaults, GenerationDefaults::default());
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llm-gateway.yaml");

        let mut config = GatewayConfig::default();
        config.spec.backends.push(
            BackendConfig::new("openai", BackendKind::Hosted, DEFAULT_OPENAI_ENDPOINT, DEFAULT_OPENAI_MODEL)
                .with_api_key("sk-test"),
        );
        config.to_yaml_file(&path).unwrap();

        let loaded = GatewayConfig::from_yaml_file(&path).unwrap();
        assert_eq!(loaded.spec.backends, config.spec.backends);
    }

    #[test]
    fn test_env_registers_presets() {
        let mut config = GatewayConfig::default();
        config.apply_overrides_from(vars(&[
            ("OPENAI_API_KEY", "sk-openai"),
            ("OPENAI_API_BASE", "https://proxy.example/v1"),
            ("OPENAI_MODEL", "gpt-4o"),
            ("DEEPSEEK_API_KEY", "sk-deepseek"),
            ("DEEPSEEK_API_BASE", "http://deepseek:8000/v1"),
            ("DEEPSEEK_MODEL", "deepseek-coder"),
            ("GIGACHAT_CREDENTIALS", "Y2xpZW50OnNlY3JldA=="),
            ("GIGACHAT_SCOPE", "GIGACHAT_API_CORP"),
            ("GIGACHAT_MODEL", "GigaChat-Pro"),
            ("GIGACHAT_AUTH_URL", "https://auth.example/api/v2/oauth"),
            ("GIGACHAT_API_BASE", "https://gigachat.example/api/v1"),
            ("GIGACHAT_VERIFY_SSL", "false"),
            ("LM_STUDIO_URL", "http://lmstudio:1234/v1"),
            ("LOCAL_MODEL", "qwen2.5-7b-instruct"),
        ]));

        let names: Vec<&str> = config.spec.backends.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["openai", "deepseek", "gigachat", "local"]);

        let openai = config.backend("openai").unwrap();
        assert_eq!(openai.kind, BackendKind::Hosted);
        assert_eq!(openai.api_key.as_deref(), Some("sk-openai"));
        assert_eq!(openai.endpoint, "https://proxy.example/v1");
        assert_eq!(openai.model, "gpt-4o");

        let deepseek = config.backend("deepseek").unwrap();
        assert_eq!(deepseek.kind, BackendKind::Hosted);
        assert_eq!(deepseek.api_key.as_deref(), Some("sk-deepseek"));
        assert_eq!(deepseek.endpoint, "http://deepseek:8000/v1");
        assert_eq!(deepseek.model, "deepseek-coder");

        let gigachat = config.backend("gigachat").unwrap();
        assert_eq!(gigachat.kind, BackendKind::GigaChat);
        assert_eq!(gigachat.api_key.as_deref(), Some("Y2xpZW50OnNlY3JldA=="));
        assert_eq!(gigachat.scope.as_deref(), Some("GIGACHAT_API_CORP"));
        assert_eq!(gigachat.model, "GigaChat-Pro");
        assert_eq!(gigachat.auth_url.as_deref(), Some("https://auth.example/api/v2/oauth"));
        assert_eq!(gigachat.endpoint, "https://gigachat.example/api/v1");
        assert!(gigachat.accept_invalid_certs);

        let local = config.backend("local").unwrap();
        assert_eq!(local.kind, BackendKind::Local);
        assert_eq!(local.endpoint, "http://lmstudio:1234/v1");
        assert_eq!(local.model, "qwen2.5-7b-instruct");
        assert_eq!(local.api_key, None);
        assert_eq!(config.default_backend(), Some("openai"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_without_credentials_registers_only_local() {
        let mut config = GatewayConfig::default();
        config.apply_overrides_from(vars(&[("OPENAI_MODEL", "gpt-4o-mini")]));

        assert_eq!(config.spec.backends.len(), 1);
        assert_eq!(config.spec.backends[0].name, "local");
        assert_eq!(config.default_backend(), Some("local"));
    }

    #[test]
    fn test_env_overrides_existing_backend_and_defaults() {
        let mut config = GatewayConfig::default();
        config.spec.backends.push(
            BackendConfig::new("openai", BackendKind::Hosted, DEFAULT_OPENAI_ENDPOINT, DEFAULT_OPENAI_MODEL)
                .with_api_key("env:OPENAI_API_KEY"),
        );

        config.apply_overrides_from(vars(&[
            ("OPENAI_MODEL", "gpt-4o-mini"),
            ("LLM_GATEWAY_DEFAULT_BACKEND", "openai"),
            ("LLM_GATEWAY_DEFAULT_MAX_TOKENS", "256"),
            ("LLM_GATEWAY_DEFAULT_TEMPERATURE", "0.25"),
            ("LLM_GATEWAY_REQUEST_TIMEOUT_SECS", "not-a-number"),
        ]));

        let openai = config.backend("openai").unwrap();
        assert_eq!(openai.model, "gpt-4o-mini");
        assert_eq!(openai.api_key.as_deref(), Some("env:OPENAI_API_KEY"));
        assert!(config.backend("local").is_none());
        assert_eq!(config.spec.selection.default_backend.as_deref(), Some("openai"));
        assert_eq!(config.spec.defaults.max_tokens, 256);
        assert_eq!(config.spec.defaults.temperature, 0.25);
        assert_eq!(config.spec.request_timeout_secs, 120);
    }

    #[test]
    fn test_resolve_api_key_indirection() {
        std::env::set_var("LLM_GATEWAY_TEST_RESOLVE_KEY", "sk-from-env");
        let backend = BackendConfig::new("openai", BackendKind::Hosted, DEFAULT_OPENAI_ENDPOINT, DEFAULT_OPENAI_MODEL)
            .with_api_key("env:LLM_GATEWAY_TEST_RESOLVE_KEY");
        assert_eq!(backend.resolve_api_key().unwrap().as_deref(), Some("sk-from-env"));

        let missing = backend.clone().with_api_key("env:LLM_GATEWAY_TEST_MISSING_KEY");
        assert!(missing.resolve_api_key().is_err());

        let local = BackendConfig::new("local", BackendKind::Local, DEFAULT_LOCAL_ENDPOINT, DEFAULT_LOCAL_MODEL);
        assert_eq!(local.resolve_api_key().unwrap(), None);
    }

    #[test]
    fn test_validation() {
        let mut manifest = GatewayConfig::default();
        assert!(manifest.validate().is_ok());

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "NodeConfig".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        // Hosted backend without a key
        manifest.spec.backends.push(BackendConfig::new(
            "openai",
            BackendKind::Hosted,
            DEFAULT_OPENAI_ENDPOINT,
            DEFAULT_OPENAI_MODEL,
        ));
        assert!(manifest.validate().is_err());
        manifest.spec.backends[0].api_key = Some("sk-test".into());
        assert!(manifest.validate().is_ok());

        // Duplicate name
        manifest.spec.backends.push(manifest.spec.backends[0].clone());
        assert!(manifest.validate().is_err());
        manifest.spec.backends.pop();

        // Endpoints must be absolute http(s) URLs
        manifest.spec.backends[0].endpoint = "localhost:1234/v1".into();
        assert!(manifest.validate().is_err());
        manifest.spec.backends[0].endpoint = "api.openai.com/v1".into();
        assert!(manifest.validate().is_err());
        manifest.spec.backends[0].endpoint = DEFAULT_OPENAI_ENDPOINT.into();
        manifest.spec.backends[0].auth_url = Some("ngw.devices.sberbank.ru:9443/api/v2/oauth".into());
        assert!(manifest.validate().is_err());
        manifest.spec.backends[0].auth_url = Some(DEFAULT_GIGACHAT_AUTH_URL.into());
        assert!(manifest.validate().is_ok());
        manifest.spec.backends[0].auth_url = None;

        // Unknown default backend
        manifest.spec.selection.default_backend = Some("missing".into());
        assert!(manifest.validate().is_err());
        manifest.spec.selection.default_backend = Some("openai".into());
        assert!(manifest.validate().is_ok());

        manifest.spec.request_timeout_secs = 0;
        assert!(manifest.validate().is_err());
    }
}
