use crate::core::cache::RATE_TABLE_TTL;
use crate::engine::EngineConfig;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

fn default_base_url() -> String {
    "https://openexchangerates.org".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_ttl_secs() -> u64 {
    RATE_TABLE_TTL.as_secs()
}

fn default_retry_delay_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub app_id: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// `disk` keeps the rate table between runs.
    #[serde(default)]
    pub backend: StorageBackend,
    pub path: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_secs: default_ttl_secs(),
            backend: StorageBackend::default(),
            path: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineSettings {
    #[serde(default)]
    pub fetch_retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            fetch_retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Disk,
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct HistoryConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "fxconv", "fxconv")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    /// Directory holding the on-disk conversion history.
    pub fn history_path(&self) -> Result<PathBuf> {
        Self::data_path(self.history.path.as_deref(), "history")
    }

    /// Directory holding the persisted rate table.
    pub fn rate_cache_path(&self) -> Result<PathBuf> {
        Self::data_path(self.cache.path.as_deref(), "rates")
    }

    fn data_path(custom_path: Option<&str>, default_dir: &str) -> Result<PathBuf> {
        if let Some(custom_path) = custom_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "fxconv", "fxconv")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().join(default_dir))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            rate_ttl: Duration::from_secs(self.cache.ttl_secs),
            fetch_retries: self.engine.fetch_retries,
            retry_delay: Duration::from_millis(self.engine.retry_delay_ms),
        }
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
