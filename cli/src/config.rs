// Configuration management for the ringline relay
//
// Cross-platform config stored in:
// - macOS: ~/.config/ringline/config.json
// - Linux: ~/.config/ringline/config.json
// - Windows: %APPDATA%\ringline\config.json

use anyhow::{Context, Result};
use ringline_core::DEFAULT_KEYWORDS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Port the relay listens on
    pub listen_port: u16,

    /// Presence store path; empty means in-memory (presence lost on restart)
    pub storage_path: Option<String>,

    /// Trigger words for the keyword filter
    pub keywords: Vec<String>,

    /// Push delivery settings
    pub push: PushConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushConfig {
    /// HTTP endpoint wakeups are posted to; unset disables push
    pub endpoint: Option<String>,

    /// Server key sent in the authorization header
    pub server_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: 3000,
            storage_path: None,
            keywords: DEFAULT_KEYWORDS.iter().map(|w| w.to_string()).collect(),
            push: PushConfig::default(),
        }
    }
}

impl Config {
    /// Get the config directory path (cross-platform)
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("ringline");

        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        Ok(config_dir)
    }

    /// Get the data directory path (cross-platform)
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .context("Failed to determine data directory")?
            .join("ringline");

        std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

        Ok(data_dir)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from file, or create default if not exists
    pub fn load() -> Result<Self> {
        let config_file = Self::config_file()?;

        if config_file.exists() {
            let contents =
                std::fs::read_to_string(&config_file).context("Failed to read config file")?;
            let config: Config =
                serde_json::from_str(&contents).context("Failed to parse config file")?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let config_file = Self::config_file()?;
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_file, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Set a config value
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "listen_port" => {
                self.listen_port = value.parse().context("Invalid port number")?;
            }
            "storage_path" => {
                self.storage_path = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            "push.endpoint" => {
                self.push.endpoint = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            "push.server_key" => {
                self.push.server_key = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        self.save()?;
        Ok(())
    }

    /// Get a config value as a display string
    pub fn get(&self, key: &str) -> Result<String> {
        let value = match key {
            "listen_port" => self.listen_port.to_string(),
            "storage_path" => self.storage_path.clone().unwrap_or_default(),
            "push.endpoint" => self.push.endpoint.clone().unwrap_or_default(),
            "push.server_key" => self.push.server_key.clone().unwrap_or_default(),
            _ => anyhow::bail!("Unknown config key: {}", key),
        };
        Ok(value)
    }
}
