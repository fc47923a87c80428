use crate::error::{LoopError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Connection settings for the hosted backend. Empty values mean "not configured".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Per-category cap on queued records; oldest entries are evicted first.
    #[serde(default = "default_max_queue_items")]
    pub max_queue_items: usize,
    #[serde(default = "default_batch_records")]
    pub batch_loops: usize,
    #[serde(default = "default_batch_records")]
    pub batch_nodes: usize,
    #[serde(default = "default_batch_records")]
    pub batch_edges: usize,
    #[serde(default = "default_batch_domains")]
    pub batch_domains: usize,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
    /// Serialized queue size above which every category is halved before writing.
    #[serde(default = "default_size_threshold_bytes")]
    pub size_threshold_bytes: usize,
    #[serde(default = "default_quota_warning_cooldown_secs")]
    pub quota_warning_cooldown_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_capacity_bytes")]
    pub capacity_bytes: usize,
}

fn default_max_queue_items() -> usize {
    15
}

fn default_batch_records() -> usize {
    5
}

fn default_batch_domains() -> usize {
    3
}

fn default_interval_secs() -> u64 {
    120
}

fn default_initial_delay_secs() -> u64 {
    5
}

fn default_size_threshold_bytes() -> usize {
    1_500_000
}

fn default_quota_warning_cooldown_secs() -> u64 {
    60 * 60
}

fn default_capacity_bytes() -> usize {
    5 * 1024 * 1024
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_queue_items: default_max_queue_items(),
            batch_loops: default_batch_records(),
            batch_nodes: default_batch_records(),
            batch_edges: default_batch_records(),
            batch_domains: default_batch_domains(),
            interval_secs: default_interval_secs(),
            initial_delay_secs: default_initial_delay_secs(),
            size_threshold_bytes: default_size_threshold_bytes(),
            quota_warning_cooldown_secs: default_quota_warning_cooldown_secs(),
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn quota_warning_cooldown(&self) -> Duration {
        Duration::from_secs(self.quota_warning_cooldown_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: default_capacity_bytes(),
        }
    }
}

impl RemoteConfig {
    /// True when both the endpoint and the key look usable.
    pub fn is_configured(&self) -> bool {
        let url = self.url.trim();
        !url.is_empty()
            && !self.api_key.trim().is_empty()
            && (url.starts_with("http://") || url.starts_with("https://"))
            && !url.contains("your-project")
    }
}

/// Returns the Loopwise home directory (~/.loopwise/ by default, respects LOOPWISE_HOME env var).
pub fn loopwise_home() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("LOOPWISE_HOME") {
        return Ok(PathBuf::from(home));
    }
    let home = dirs::home_dir()
        .ok_or_else(|| LoopError::Config("Could not find home directory".to_string()))?;
    Ok(home.join(".loopwise"))
}

impl Config {
    /// Load the config file, falling back to defaults when it does not exist.
    /// `LOOPWISE_REMOTE_URL` and `LOOPWISE_REMOTE_KEY` override the file.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            tracing::debug!(path = %config_path.display(), "No config file, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(loopwise_home()?.join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("LOOPWISE_REMOTE_URL") {
            self.remote.url = url;
        }
        if let Ok(key) = std::env::var("LOOPWISE_REMOTE_KEY") {
            self.remote.api_key = key;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.sync.max_queue_items, 15);
        assert_eq!(config.sync.batch_domains, 3);
        assert_eq!(config.sync.interval(), Duration::from_secs(120));
        assert_eq!(config.storage.capacity_bytes, 5 * 1024 * 1024);
        assert!(!config.remote.is_configured());
    }

    #[test]
    fn test_partial_sync_section() {
        let config: Config = toml::from_str(
            r#"
            [sync]
            max_queue_items = 50
            interval_secs = 300
            "#,
        )
        .unwrap();
        assert_eq!(config.sync.max_queue_items, 50);
        assert_eq!(config.sync.interval_secs, 300);
        assert_eq!(config.sync.batch_loops, 5);
    }

    #[test]
    fn test_remote_configured() {
        let mut remote = RemoteConfig {
            url: "https://abc.example.co".to_string(),
            api_key: "key".to_string(),
        };
        assert!(remote.is_configured());

        remote.url = "https://your-project.example.co".to_string();
        assert!(!remote.is_configured());

        remote.url = "abc.example.co".to_string();
        assert!(!remote.is_configured());
    }
}
