//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default request timeout for the remote store
pub const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 10;

/// Default reminder polling interval
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default due-soon window
pub const DEFAULT_LOOKAHEAD_SECS: u64 = 300;

/// Agenda configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Where `projects.json` and `tasks.json` live
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Web app endpoint of the remote spreadsheet store
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub lookahead_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: DEFAULT_SYNC_TIMEOUT_SECS,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            lookahead_secs: DEFAULT_LOOKAHEAD_SECS,
        }
    }
}

impl StorageConfig {
    /// Data directory: `AGENDA_DATA_DIR`, then the config value, then the
    /// platform data directory
    pub fn resolved_data_dir(&self) -> anyhow::Result<PathBuf> {
        if let Ok(dir) = env::var("AGENDA_DATA_DIR")
            && !dir.trim().is_empty()
        {
            return Ok(PathBuf::from(dir));
        }

        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }

        Ok(dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?
            .join("agenda"))
    }
}

impl SyncConfig {
    /// Remote endpoint: `AGENDA_SYNC_URL` wins over the config value
    pub fn resolved_base_url(&self) -> Option<String> {
        env::var("AGENDA_SYNC_URL")
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .or_else(|| self.base_url.clone())
    }
}

fn validate_url(url: &str) -> anyhow::Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow!("Sync URL must start with http:// or https://, got '{}'", url))
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("AGENDA_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("agenda")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or the defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(url) = &self.sync.base_url {
            validate_url(url)?;
        }
        if self.sync.timeout_secs == 0 {
            return Err(anyhow!("sync.timeout_secs must be greater than zero"));
        }
        if self.notifications.interval_secs == 0 {
            return Err(anyhow!("notifications.interval_secs must be greater than zero"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "storage.data_dir" => Ok(self.storage.resolved_data_dir()?.display().to_string()),

            "sync.base_url" => Ok(self
                .sync
                .resolved_base_url()
                .unwrap_or_else(|| "(not set - use AGENDA_SYNC_URL env var)".to_string())),
            "sync.timeout_secs" => Ok(self.sync.timeout_secs.to_string()),

            "notifications.enabled" => Ok(self.notifications.enabled.to_string()),
            "notifications.interval_secs" => Ok(self.notifications.interval_secs.to_string()),
            "notifications.lookahead_secs" => Ok(self.notifications.lookahead_secs.to_string()),

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `agenda config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "storage.data_dir" => {
                self.storage.data_dir = if value.trim().is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }

            "sync.base_url" => {
                let url = value.trim();
                if url.is_empty() {
                    self.sync.base_url = None;
                } else {
                    validate_url(url)?;
                    self.sync.base_url = Some(url.to_string());
                }
            }
            "sync.timeout_secs" => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
                if secs == 0 {
                    return Err(anyhow!("Timeout must be greater than zero"));
                }
                self.sync.timeout_secs = secs;
            }

            "notifications.enabled" => {
                self.notifications.enabled = value
                    .parse()
                    .with_context(|| format!("Invalid enabled value: {} (use true or false)", value))?;
            }
            "notifications.interval_secs" => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid interval_secs value: {}", value))?;
                if secs == 0 {
                    return Err(anyhow!("Polling interval must be greater than zero"));
                }
                self.notifications.interval_secs = secs;
            }
            "notifications.lookahead_secs" => {
                self.notifications.lookahead_secs = value
                    .parse()
                    .with_context(|| format!("Invalid lookahead_secs value: {}", value))?;
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `agenda config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = [
            "storage.data_dir",
            "sync.base_url",
            "sync.timeout_secs",
            "notifications.enabled",
            "notifications.interval_secs",
            "notifications.lookahead_secs",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}
