// Configuration File Support
//
// TOML configuration for the trigger executor with environment variable
// overrides. The default file lives in the platform config directory,
// e.g. ~/.config/workshop-triggers/config.toml on Linux.

use crate::audit::DEFAULT_LOG_DIR;
use crate::triggers::Signatures;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Command execution bounds
    pub execution: ExecutionConfig,

    /// Tool lookup locations
    pub tools: ToolsConfig,

    /// Audit trail location
    pub audit: AuditConfig,

    /// HTTP API
    pub server: ServerConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,

    /// Output signatures used to classify tool results
    pub signatures: Signatures,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Command execution configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Default bound for probe commands
    pub command_timeout_secs: u64,

    /// Bound for `where` / `command -v` lookups
    pub lookup_timeout_ms: u64,

    /// Maximum bytes kept per output stream
    pub max_output_bytes: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 30,
            lookup_timeout_ms: 2000,
            max_output_bytes: 1024 * 1024,
        }
    }
}

/// Tool location configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    /// App data root holding `tools/android/platform-tools`
    /// (default: derived from the environment)
    pub data_dir: Option<PathBuf>,

    /// Directory holding the `edl/` and `mtkclient/` helper toolkits
    pub libs_dir: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            libs_dir: PathBuf::from("libs"),
        }
    }
}

/// Audit trail configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuditConfig {
    /// Directory for `authorization-triggers-<date>.log` files
    pub log_dir: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

/// HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Listen port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to serve `/metrics`
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load configuration from the default config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// A missing file yields defaults. Environment overrides are applied
    /// either way, then the result is validated.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// final configuration is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) =
            directories::ProjectDirs::from("com", "bobbys-workshop", "workshop-triggers")
        {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("workshop-triggers")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides
    ///
    /// Environment variables take precedence over config file values:
    /// - WORKSHOP_LOG_LEVEL
    /// - WORKSHOP_LOG_FORMAT
    /// - WORKSHOP_COMMAND_TIMEOUT_SECS
    /// - WORKSHOP_LIBS_DIR
    /// - WORKSHOP_AUDIT_LOG_DIR
    /// - WORKSHOP_HOST
    /// - WORKSHOP_PORT
    /// - WORKSHOP_METRICS_ENABLED
    pub fn apply_env_overrides<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = env("WORKSHOP_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = env("WORKSHOP_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Some(secs) = env("WORKSHOP_COMMAND_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                if secs > 0 {
                    self.execution.command_timeout_secs = secs;
                }
            }
        }

        if let Some(dir) = env("WORKSHOP_LIBS_DIR") {
            self.tools.libs_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env("WORKSHOP_AUDIT_LOG_DIR") {
            self.audit.log_dir = PathBuf::from(dir);
        }

        if let Some(host) = env("WORKSHOP_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env("WORKSHOP_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }

        if let Some(enabled) = env("WORKSHOP_METRICS_ENABLED") {
            self.metrics.enabled = enabled.parse().unwrap_or(self.metrics.enabled);
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        if self.execution.command_timeout_secs == 0 {
            anyhow::bail!("Command timeout must be > 0");
        }
        if self.execution.lookup_timeout_ms == 0 {
            anyhow::bail!("Lookup timeout must be > 0");
        }
        if self.execution.max_output_bytes < 1024 {
            anyhow::bail!("Max output size must be at least 1024 bytes");
        }

        if self.server.port == 0 {
            anyhow::bail!("Server port must be > 0");
        }

        Ok(())
    }
}
