//! Configuration - TOML file with environment overrides
//!
//! Installed once per process; everything reads `current()`, which falls
//! back to the defaults when nothing was installed.

use crate::error::ConfigError;
use once_cell::sync::{Lazy, OnceCell};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

static INSTALLED: OnceCell<InteropConfig> = OnceCell::new();
static DEFAULT: Lazy<InteropConfig> = Lazy::new(InteropConfig::default);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteropConfig {
    #[serde(default)]
    pub pinning: PinningConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinningConfig {
    /// Allow direct (critical) pins; when false every pin is a copy
    #[serde(default = "default_true")]
    pub allow_critical: bool,

    /// Larger critical requests are served as copies instead
    #[serde(default = "default_max_critical_bytes")]
    pub max_critical_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,

    #[serde(default)]
    pub file: Option<PathBuf>,

    #[serde(default)]
    pub spans: bool,
}

impl Default for InteropConfig {
    fn default() -> Self {
        Self {
            pinning: PinningConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PinningConfig {
    fn default() -> Self {
        Self {
            allow_critical: default_true(),
            max_critical_bytes: default_max_critical_bytes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            file: None,
            spans: false,
        }
    }
}

impl InteropConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Apply `NATIVE_BRIDGE_*` environment overrides
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(value) = std::env::var("NATIVE_BRIDGE_ALLOW_CRITICAL") {
            self.pinning.allow_critical = parse_flag(&value).ok_or_else(|| {
                ConfigError::Invalid(format!("NATIVE_BRIDGE_ALLOW_CRITICAL={}", value))
            })?;
        }
        if let Ok(value) = std::env::var("NATIVE_BRIDGE_MAX_CRITICAL_BYTES") {
            self.pinning.max_critical_bytes = value.parse().map_err(|_| {
                ConfigError::Invalid(format!("NATIVE_BRIDGE_MAX_CRITICAL_BYTES={}", value))
            })?;
        }
        if let Ok(level) = std::env::var("NATIVE_BRIDGE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(path) = std::env::var_os("NATIVE_BRIDGE_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(path));
        }
        self.logging.json |= std::env::var_os("NATIVE_BRIDGE_LOG_JSON").is_some();
        self.logging.spans |= std::env::var_os("NATIVE_BRIDGE_LOG_SPANS").is_some();
        self.validate()?;
        Ok(self)
    }

    /// Defaults, or the file named by `NATIVE_BRIDGE_CONFIG`, plus overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = match std::env::var_os("NATIVE_BRIDGE_CONFIG") {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        base.with_env_overrides()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "unknown log level '{}'",
                self.logging.level
            )));
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// Install the process-wide configuration; only the first call wins
pub fn install(config: InteropConfig) -> Result<(), ConfigError> {
    INSTALLED.set(config).map_err(|_| ConfigError::AlreadyInstalled)
}

/// Installed configuration, or the defaults
pub fn current() -> &'static InteropConfig {
    INSTALLED.get().unwrap_or(&DEFAULT)
}

pub fn is_installed() -> bool {
    INSTALLED.get().is_some()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn default_true() -> bool {
    true
}

fn default_max_critical_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_level() -> String {
    "info".to_string()
}
