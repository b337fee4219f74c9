//! Configuration system for strait.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $STRAIT_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/strait/config.toml
//!   3. ~/.config/strait/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StraitConfig {
    pub network: NetworkConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// IPv4 address the daemon binds to.
    pub bind_addr: String,
    /// UDP port the daemon binds to.
    pub bind_port: u16,
    /// How long association establishment may take before giving up, in ms.
    pub association_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// How many times the client re-sends a request before giving up.
    /// The transport has no retransmission of its own.
    pub request_retries: u32,
    /// Interval between response polls, in ms.
    pub response_poll_ms: u64,
    /// Response polls per request attempt.
    pub polls_per_attempt: u32,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            bind_port: 8080,
            association_timeout_ms: 5000,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_retries: 5,
            response_poll_ms: 10,
            polls_per_attempt: 100,
        }
    }
}

// ── Path helpers ─────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_or_tmp().join(".config"))
        .join("strait")
}

fn home_or_tmp() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
}

// ── Loading ──────────────────────────────────────────────────────────────────

impl StraitConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            StraitConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("STRAIT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Apply STRAIT_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("STRAIT_NETWORK__BIND_ADDR") {
            self.network.bind_addr = v;
        }
        if let Ok(v) = std::env::var("STRAIT_NETWORK__BIND_PORT") {
            if let Ok(p) = v.parse() {
                self.network.bind_port = p;
            }
        }
        if let Ok(v) = std::env::var("STRAIT_NETWORK__ASSOCIATION_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                self.network.association_timeout_ms = ms;
            }
        }
        if let Ok(v) = std::env::var("STRAIT_HTTP__REQUEST_RETRIES") {
            if let Ok(n) = v.parse() {
                self.http.request_retries = n;
            }
        }
    }
}
