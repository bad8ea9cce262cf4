use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8090/api";
pub const DEFAULT_CHUNK_SIZE: usize = 12;
pub const DEFAULT_PREDICTION_STEPS: usize = 30;
pub const DEFAULT_PREFETCH_DELAY_MS: u64 = 100;
pub const DEFAULT_PLAYBACK_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Engine tuning, loadable from a TOML file. Every field is optional there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
    /// Steps per background measurement fetch.
    pub chunk_size: usize,
    /// Pause between two background fetches.
    pub prefetch_delay_ms: u64,
    /// Steps per on-demand prediction fetch.
    pub prediction_steps: usize,
    pub playback_interval_ms: u64,
    /// Keep walking the region behind the cursor after the forward pass stopped early.
    pub wrap_after_failure: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            prefetch_delay_ms: DEFAULT_PREFETCH_DELAY_MS,
            prediction_steps: DEFAULT_PREDICTION_STEPS,
            playback_interval_ms: DEFAULT_PLAYBACK_INTERVAL_MS,
            wrap_after_failure: true,
        }
    }
}

impl EngineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn prefetch_delay(&self) -> Duration {
        Duration::from_millis(self.prefetch_delay_ms)
    }

    /// Never zero; `tokio::time::interval` rejects a zero period.
    pub fn playback_interval(&self) -> Duration {
        Duration::from_millis(self.playback_interval_ms.max(1))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.chunk_size > 0, "chunk_size must be at least 1");
        ensure!(self.prediction_steps > 0, "prediction_steps must be at least 1");
        ensure!(
            self.playback_interval_ms > 0,
            "playback_interval_ms must be at least 1"
        );
        ensure!(!self.base_url.is_empty(), "base_url must not be empty");
        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<EngineConfig> {
    let config: EngineConfig = toml::from_str(content).context("Failed to parse engine config")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content).with_context(|| format!("Invalid config file: {}", path.display()))
}
