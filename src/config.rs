//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.
//!
//! The guest endpoint has no default: [`Config::validate`] must pass before a
//! client is built, and the binary refuses to start otherwise.

use crate::retry::{Backoff, RetryPolicy, DEFAULT_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS};
use reqwest::Url;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Primary environment variable for the endpoint address
pub const API_URL_ENV: &str = "RSVP_API_URL";

/// Name used by the web front end's build; accepted as a fallback
pub const LEGACY_API_URL_ENV: &str = "VITE_API_URL";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// File this config was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Guest endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the guest sheet endpoint (required)
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_backoff_ms() -> u64 {
    DEFAULT_BACKOFF_MS
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl ApiConfig {
    /// Parse and check the endpoint address
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        let raw = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingApiUrl)?;

        let url = Url::parse(raw).map_err(|e| ConfigError::InvalidApiUrl {
            url: raw.to_string(),
            error: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::InvalidApiUrl {
                url: raw.to_string(),
                error: format!("unsupported scheme '{}'", scheme),
            }),
        }
    }

    /// Linear backoff: `backoff_ms * n` after failed attempt `n`
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Backoff::Linear {
                step: Duration::from_millis(self.backoff_ms),
            },
        )
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        config.source = Some(path.to_path_buf());

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from an explicit path, the default locations, or the environment.
    ///
    /// An explicit path must exist. A default location that exists but fails
    /// to parse is an error too; the endpoint may be in it. Runs before
    /// logging is up, so the chosen file is recorded in `source` instead.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_with_env(path);
        }

        for path in Self::default_paths() {
            if path.exists() {
                return Self::load_with_env(&path);
            }
        }

        Ok(Self::from_env())
    }

    /// Default config locations, most specific first
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("rsvp").join("config.toml")),
            Some(PathBuf::from("./rsvp.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Fail unless the endpoint address is present and usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api.endpoint().map(|_| ())
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // API overrides
        if let Some(url) = set(API_URL_ENV).or_else(|| set(LEGACY_API_URL_ENV)) {
            self.api.url = Some(url);
        }
        if let Some(attempts) = set("RSVP_MAX_ATTEMPTS") {
            if let Ok(n) = attempts.trim().parse() {
                self.api.max_attempts = n;
            }
        }
        if let Some(backoff) = set("RSVP_BACKOFF_MS") {
            if let Ok(ms) = backoff.trim().parse() {
                self.api.backoff_ms = ms;
            }
        }

        // Logging overrides
        if let Some(level) = set("RSVP_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = set("RSVP_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("API URL is not configured (set RSVP_API_URL or api.url)")]
    MissingApiUrl,

    #[error("Invalid API URL {url:?}: {error}")]
    InvalidApiUrl { url: String, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# RSVP Configuration
#
# Environment variables override these settings:
# - RSVP_API_URL (or VITE_API_URL)
# - RSVP_MAX_ATTEMPTS
# - RSVP_BACKOFF_MS
# - RSVP_LOG_LEVEL
# - RSVP_LOG_FORMAT

[api]
# Guest sheet endpoint (required)
# url = "https://script.google.com/macros/s/DEPLOYMENT_ID/exec"

# Attempts per request, first try included
max_attempts = 3

# Backoff step in milliseconds; the wait after failure n is n * backoff_ms
backoff_ms = 1000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
