//! Configuration management for Clustergate API
//!
//! This module provides a centralized configuration system that loads settings from:
//! 1. Environment variables (highest priority)
//! 2. Configuration file (TOML format)
//! 3. Default values (lowest priority)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Main configuration struct for Clustergate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Credential database configuration
    pub database: DatabaseConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Cluster access configuration
    pub kubernetes: KubernetesConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite:///var/lib/clustergate/clustergate.db")
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection attempts before start-up gives up
    pub connect_attempts: u32,
    /// Seconds between connection attempts
    pub retry_delay_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Directory for log files
    pub log_dir: PathBuf,
    /// Enable file logging
    pub file_logging_enabled: bool,
    /// Emit console logs as JSON
    pub json_format: bool,
}

/// Cluster access configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesConfig {
    /// Namespace for manifests that declare none
    pub default_namespace: String,
    /// Deadline for each control-plane call, client construction included
    pub request_timeout_secs: u64,
    /// Reuse built clients while a cluster's credential is unchanged
    pub client_cache_enabled: bool,
    /// Irregular plurals, lowercase kind to resource name
    pub plural_overrides: HashMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:///var/lib/clustergate/clustergate.db".to_string(),
            max_connections: 10,
            connect_attempts: 10,
            retry_delay_secs: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("/var/log/clustergate"),
            file_logging_enabled: false,
            json_format: false,
        }
    }
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            default_namespace: "default".to_string(),
            request_timeout_secs: 30,
            client_cache_enabled: true,
            plural_overrides: HashMap::new(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from the first config file found, then environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::find_config_file() {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.clone(), e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            // Environment variable override
            std::env::var("CLUSTERGATE_CONFIG").ok().map(PathBuf::from),
            // Standard locations
            Some(PathBuf::from("/etc/clustergate/config.toml")),
            Some(PathBuf::from("./config.toml")),
            Some(PathBuf::from("./clustergate.toml")),
        ];

        paths.into_iter().flatten().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Server
        if let Some(host) = var("CLUSTERGATE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("CLUSTERGATE_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }

        // Database
        if let Some(url) = var("CLUSTERGATE_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(max) = var("CLUSTERGATE_DATABASE_MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
            self.database.max_connections = max;
        }
        if let Some(n) = var("CLUSTERGATE_DATABASE_CONNECT_ATTEMPTS").and_then(|v| v.parse().ok()) {
            self.database.connect_attempts = n;
        }
        if let Some(secs) = var("CLUSTERGATE_DATABASE_RETRY_DELAY_SECS").and_then(|v| v.parse().ok()) {
            self.database.retry_delay_secs = secs;
        }

        // Logging
        if let Some(level) = var("CLUSTERGATE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(path) = var("CLUSTERGATE_LOG_DIR") {
            self.logging.log_dir = PathBuf::from(path);
        }
        if let Some(enabled) = var("CLUSTERGATE_FILE_LOGGING") {
            self.logging.file_logging_enabled = enabled.parse().unwrap_or(false);
        }
        if let Some(json) = var("CLUSTERGATE_LOG_JSON") {
            self.logging.json_format = json.parse().unwrap_or(false);
        }

        // Kubernetes
        if let Some(ns) = var("CLUSTERGATE_DEFAULT_NAMESPACE") {
            self.kubernetes.default_namespace = ns;
        }
        if let Some(secs) = var("CLUSTERGATE_REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.kubernetes.request_timeout_secs = secs;
        }
        if let Some(enabled) = var("CLUSTERGATE_CLIENT_CACHE") {
            self.kubernetes.client_cache_enabled = enabled.parse().unwrap_or(true);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("Port cannot be 0".to_string()));
        }

        if self.database.url.is_empty() {
            return Err(ConfigError::Validation("Database URL cannot be empty".to_string()));
        }

        if self.kubernetes.default_namespace.is_empty() {
            return Err(ConfigError::Validation(
                "Default namespace cannot be empty".to_string(),
            ));
        }

        if self.kubernetes.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "Request timeout must be at least one second".to_string(),
            ));
        }

        for (kind, plural) in &self.kubernetes.plural_overrides {
            if plural.is_empty() || plural.chars().any(|c| c.is_uppercase()) {
                return Err(ConfigError::Validation(format!(
                    "Plural override for '{}' must be a non-empty lowercase name",
                    kind
                )));
            }
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Failed to read configuration file
    FileRead(PathBuf, String),
    /// Failed to parse configuration
    Parse(String),
    /// Configuration validation failed
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, err) => {
                write!(f, "Failed to read config file {:?}: {}", path, err)
            }
            ConfigError::Parse(err) => write!(f, "Failed to parse config: {}", err),
            ConfigError::Validation(err) => write!(f, "Config validation failed: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}
