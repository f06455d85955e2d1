//! Configuration for the qstudio CLI.
//!
//! Sources, highest precedence first:
//! 1. Environment variables (`QSTUDIO_` prefix, `.env` is loaded)
//! 2. YAML configuration file
//! 3. Default values

use std::fmt;
use std::path::Path;
use std::time::Duration;

use qstudio_oracle::{BackendCredentials, DEFAULT_CHANNEL, EndpointConfig};
use serde::{Deserialize, Serialize};

/// Complete CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// External service endpoints.
    #[serde(default)]
    pub oracles: OracleConfig,

    /// Where programs run.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Code-generation and execution service settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Code-generation endpoint.
    #[serde(default = "default_codegen_url")]
    pub codegen_url: String,

    /// Execution endpoint.
    #[serde(default = "default_execution_url")]
    pub execution_url: String,

    /// Code-generation timeout in seconds.
    #[serde(default = "default_codegen_timeout")]
    pub codegen_timeout_seconds: u64,

    /// Execution timeout in seconds.
    #[serde(default = "default_execution_timeout")]
    pub execution_timeout_seconds: u64,

    /// Bearer token for both services (set via `QSTUDIO_API_KEY`).
    #[serde(default)]
    pub api_key: Option<String>,
}

impl fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleConfig")
            .field("codegen_url", &self.codegen_url)
            .field("execution_url", &self.execution_url)
            .field("codegen_timeout_seconds", &self.codegen_timeout_seconds)
            .field("execution_timeout_seconds", &self.execution_timeout_seconds)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            codegen_url: default_codegen_url(),
            execution_url: default_execution_url(),
            codegen_timeout_seconds: default_codegen_timeout(),
            execution_timeout_seconds: default_execution_timeout(),
            api_key: None,
        }
    }
}

impl OracleConfig {
    /// Code-generation request timeout.
    pub fn codegen_timeout(&self) -> Duration {
        Duration::from_secs(self.codegen_timeout_seconds)
    }

    /// Endpoint settings for the code-generation client.
    pub fn codegen_endpoint(&self) -> EndpointConfig {
        self.endpoint(&self.codegen_url, self.codegen_timeout_seconds)
    }

    /// Endpoint settings for the execution client.
    pub fn execution_endpoint(&self) -> EndpointConfig {
        self.endpoint(&self.execution_url, self.execution_timeout_seconds)
    }

    fn endpoint(&self, url: &str, timeout_seconds: u64) -> EndpointConfig {
        let endpoint =
            EndpointConfig::new(url).with_timeout(Duration::from_secs(timeout_seconds));
        match &self.api_key {
            Some(key) => endpoint.with_api_key(key.clone()),
            None => endpoint,
        }
    }
}

/// Backend selection and runtime credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Run on the local simulator even when a token is configured.
    #[serde(default)]
    pub local: bool,

    /// Runtime API token (set via `QSTUDIO_IBM_TOKEN`).
    #[serde(default)]
    pub token: Option<String>,

    /// Runtime channel.
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Runtime instance.
    #[serde(default)]
    pub instance: Option<String>,

    /// Runtime region.
    #[serde(default)]
    pub region: Option<String>,
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("local", &self.local)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("channel", &self.channel)
            .field("instance", &self.instance)
            .field("region", &self.region)
            .finish()
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            local: false,
            token: None,
            channel: default_channel(),
            instance: None,
            region: None,
        }
    }
}

impl BackendConfig {
    /// Credentials for a remote run, or `None` for the local simulator.
    pub fn credentials(&self) -> Option<BackendCredentials> {
        if self.local {
            return None;
        }
        let token = self.token.clone()?;
        Some(BackendCredentials {
            token,
            channel: self.channel.clone(),
            instance: self.instance.clone(),
            region: self.region.clone(),
        })
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "console" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_codegen_url() -> String {
    "http://localhost:8001/codegen".to_string()
}

fn default_execution_url() -> String {
    "http://localhost:8000/run".to_string()
}

fn default_codegen_timeout() -> u64 {
    60
}

fn default_execution_timeout() -> u64 {
    30 * 60
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "console".to_string()
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Config = serde_yaml_ng::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load the file (if any), then `.env`, then environment overrides.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };

        let config = config.merge_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`. Absent variables leave fields unchanged.
    pub fn merge_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        // Oracles
        if let Some(v) = lookup("QSTUDIO_CODEGEN_URL") {
            self.oracles.codegen_url = v;
        }
        if let Some(v) = lookup("QSTUDIO_EXECUTION_URL") {
            self.oracles.execution_url = v;
        }
        if let Some(val) = lookup("QSTUDIO_CODEGEN_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.oracles.codegen_timeout_seconds = val;
        }
        if let Some(val) = lookup("QSTUDIO_EXECUTION_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.oracles.execution_timeout_seconds = val;
        }
        if let Some(v) = lookup("QSTUDIO_API_KEY") {
            self.oracles.api_key = Some(v);
        }

        // Backend
        if let Some(v) = lookup("QSTUDIO_LOCAL") {
            self.backend.local = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = lookup("QSTUDIO_IBM_TOKEN") {
            self.backend.token = Some(v);
        }
        if let Some(v) = lookup("QSTUDIO_CHANNEL") {
            self.backend.channel = v;
        }
        if let Some(v) = lookup("QSTUDIO_INSTANCE") {
            self.backend.instance = Some(v);
        }
        if let Some(v) = lookup("QSTUDIO_REGION") {
            self.backend.region = Some(v);
        }

        // Logging
        if let Some(v) = lookup("QSTUDIO_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("QSTUDIO_LOG_FORMAT") {
            self.logging.format = v;
        }

        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, url) in [
            ("codegen_url", &self.oracles.codegen_url),
            ("execution_url", &self.oracles.execution_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be an http(s) URL: {url}"
                )));
            }
        }

        if self.oracles.codegen_timeout_seconds == 0 || self.oracles.execution_timeout_seconds == 0
        {
            return Err(ConfigError::ValidationError(
                "timeouts must be greater than 0".to_string(),
            ));
        }

        if self.oracles.api_key.as_deref() == Some("") {
            return Err(ConfigError::ValidationError(
                "api_key must not be empty; omit the field to disable authentication".to_string(),
            ));
        }

        if self.backend.token.as_deref() == Some("") {
            return Err(ConfigError::ValidationError(
                "backend token must not be empty; omit it to run locally".to_string(),
            ));
        }

        match self.backend.channel.as_str() {
            "ibm_quantum" | "ibm_cloud" | "ibm_quantum_platform" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Unknown runtime channel: {other}"
                )));
            }
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {other}"
                )));
            }
        }

        match self.logging.format.as_str() {
            "console" | "json" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {other}"
                )));
            }
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
