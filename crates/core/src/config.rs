use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionConfig {
    /// Heartbeat age beyond which another agent may take over.
    #[serde(default = "default_stale_threshold_ms")]
    pub stale_threshold_ms: u64,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_staleness_check_interval_ms")]
    pub staleness_check_interval_ms: u64,
}

fn default_stale_threshold_ms() -> u64 {
    60_000
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_staleness_check_interval_ms() -> u64 {
    default_heartbeat_interval_ms() * 2
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            stale_threshold_ms: default_stale_threshold_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            staleness_check_interval_ms: default_staleness_check_interval_ms(),
        }
    }
}

impl ElectionConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn staleness_check_interval(&self) -> Duration {
        Duration::from_millis(self.staleness_check_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeepAliveConfig {
    #[serde(default = "default_keep_alive_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_keep_alive_interval_ms() -> u64 {
    5 * 60 * 1000 // 5 minutes
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_keep_alive_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: None,
        }
    }
}

impl KeepAliveConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Quiet period before settings are re-applied after content changes.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_auto_join_delays_ms")]
    pub auto_join_delays_ms: Vec<u64>,
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_auto_join_delays_ms() -> Vec<u64> {
    vec![1000, 3000]
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            auto_join_delays_ms: default_auto_join_delays_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// How often the file store checks for writes made by other processes.
    #[serde(default = "default_watch_interval_ms")]
    pub watch_interval_ms: u64,
}

fn default_watch_interval_ms() -> u64 {
    1000
}

impl StoreConfig {
    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            watch_interval_ms: default_watch_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub election: ElectionConfig,
    #[serde(default)]
    pub keep_alive: KeepAliveConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Rejects settings that would let a live owner look stale between its own heartbeats.
    pub fn validate(&self) -> Result<()> {
        let e = &self.election;
        if e.heartbeat_interval_ms == 0 || e.staleness_check_interval_ms == 0 {
            return Err(Error::Config("election intervals must be non-zero".to_string()));
        }
        if e.heartbeat_interval_ms >= e.stale_threshold_ms {
            return Err(Error::Config(format!(
                "heartbeatIntervalMs ({}) must be below staleThresholdMs ({})",
                e.heartbeat_interval_ms, e.stale_threshold_ms
            )));
        }
        if self.keep_alive.interval_ms == 0 {
            return Err(Error::Config("keepAlive.intervalMs must be non-zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_protocol_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.election.stale_threshold_ms, 60_000);
        assert_eq!(cfg.election.heartbeat_interval_ms, 30_000);
        assert_eq!(cfg.election.staleness_check_interval_ms, 60_000);
        assert_eq!(cfg.keep_alive.interval_ms, 300_000);
        assert_eq!(cfg.agent.debounce_ms, 300);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let raw = r#"{ "election": { "heartbeatIntervalMs": 5000 }, "keepAlive": { "userAgent": "x" } }"#;
        let cfg: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.election.heartbeat_interval_ms, 5000);
        assert_eq!(cfg.election.stale_threshold_ms, 60_000);
        assert_eq!(cfg.keep_alive.user_agent.as_deref(), Some("x"));
        assert_eq!(cfg.agent.auto_join_delays_ms, vec![1000, 3000]);
    }

    #[test]
    fn test_validate_rejects_heartbeat_slower_than_threshold() {
        let mut cfg = Config::default();
        cfg.election.heartbeat_interval_ms = 90_000;
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_save_and_load_or_default() {
        let temp_dir = TempDir::new().unwrap();
        let paths = Paths::with_base(temp_dir.path().to_path_buf());

        let cfg = Config::load_or_default(&paths).unwrap();
        assert_eq!(cfg.store.watch_interval_ms, 1000);

        let mut cfg = Config::default();
        cfg.agent.debounce_ms = 50;
        cfg.save(&paths.config_file()).unwrap();

        let loaded = Config::load_or_default(&paths).unwrap();
        assert_eq!(loaded.agent.debounce_ms, 50);
    }
}
