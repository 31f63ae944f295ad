//! Runtime configuration.
//!
//! Loaded from a TOML file; every field has a default so a missing file or
//! partial config works. The API base URL can additionally be overridden by
//! the `CONNECT_API_URL` environment variable (handled by the binary).

use crate::auth::attempt::AttemptParams;
use crate::auth::detector::DetectionStrategy;
use serde::Deserialize;
use std::time::Duration;

/// Complete console configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthFlowConfig,
}

/// Remote API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Authorization flow settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthFlowConfig {
    /// Completion detection strategy, applied to every attempt.
    #[serde(default = "default_strategy")]
    pub strategy: DetectionStrategy,
    /// Status poll cadence (poll strategy).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Closure sampling cadence (closure strategy).
    #[serde(default = "default_closure_interval_ms")]
    pub closure_interval_ms: u64,
    /// Maximum wait before an attempt fails with a timeout.
    #[serde(default = "default_attempt_timeout_seconds")]
    pub attempt_timeout_seconds: u64,
    /// Origins trusted for inbound completion messages. Empty means "the
    /// auth URL's own origin only".
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_strategy() -> DetectionStrategy {
    DetectionStrategy::Message
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_closure_interval_ms() -> u64 {
    500
}

fn default_attempt_timeout_seconds() -> u64 {
    300
}

impl Default for AuthFlowConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            poll_interval_ms: default_poll_interval_ms(),
            closure_interval_ms: default_closure_interval_ms(),
            attempt_timeout_seconds: default_attempt_timeout_seconds(),
            allowed_origins: Vec::new(),
        }
    }
}

impl AuthFlowConfig {
    /// Detector tuning for one attempt.
    pub fn attempt_params(&self) -> AttemptParams {
        AttemptParams {
            strategy: self.strategy,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            closure_interval: Duration::from_millis(self.closure_interval_ms),
            timeout: Duration::from_secs(self.attempt_timeout_seconds),
            allowed_origins: self.allowed_origins.clone(),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            auth: AuthFlowConfig::default(),
        }
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: &str) -> Result<ConsoleConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: ConsoleConfig = toml::from_str(&contents)?;
    Ok(config)
}
