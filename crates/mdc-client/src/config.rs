//! Application configuration.

use crate::error::{AppError, AppResult};
use mdc_conn::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default config location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "MDC_CONFIG";

/// Replay source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// JSON-lines file of normalized feed events.
    #[serde(default = "default_replay_path")]
    pub path: PathBuf,
    /// Pause between replayed lines (ms). 0 replays as fast as possible.
    #[serde(default)]
    pub line_delay_ms: u64,
    /// Whether availability waits for the first replayed ticker.
    #[serde(default = "default_requires_ticker")]
    pub requires_ticker: bool,
}

fn default_replay_path() -> PathBuf {
    PathBuf::from("demos/sample_feed.jsonl")
}

fn default_requires_ticker() -> bool {
    true
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            path: default_replay_path(),
            line_delay_ms: 0,
            requires_ticker: default_requires_ticker(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// How often client health is polled into metrics (ms).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Capture window opened once the client becomes available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub id: String,
    /// Order ids whose fills are tracked in this window.
    #[serde(default)]
    pub watch_orders: Vec<String>,
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub captures: Vec<CaptureConfig>,
}

impl AppConfig {
    /// Resolve the config path: CLI arg > `MDC_CONFIG` > default.
    pub fn resolve_path(cli: Option<String>) -> String {
        cli.or_else(|| std::env::var(CONFIG_ENV_VAR).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Load from `path`, or defaults if the file does not exist.
    pub fn load(path: &str) -> AppResult<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.telemetry.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "telemetry.poll_interval_ms must be positive".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for capture in &self.captures {
            if !seen.insert(capture.id.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate capture id: {}",
                    capture.id
                )));
            }
        }
        Ok(())
    }
}
