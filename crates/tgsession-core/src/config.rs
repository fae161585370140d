//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the last used API ID, the session store directory and
//! the client gateway address.
//!
//! Configuration is stored at `~/.config/tgsession/config.json`. Values can
//! be overridden with `TGSESSION_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::DEFAULT_GATEWAY_URL;
use crate::store::DEFAULT_SESSIONS_DIR;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "tgsession";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const ENV_API_ID: &str = "TGSESSION_API_ID";
pub const ENV_API_HASH: &str = "TGSESSION_API_HASH";
pub const ENV_GATEWAY_URL: &str = "TGSESSION_GATEWAY_URL";
pub const ENV_SESSIONS_DIR: &str = "TGSESSION_SESSIONS_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    pub api_id: Option<i32>,
    pub sessions_dir: Option<PathBuf>,
    pub gateway_url: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Missing file means defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load the config file and apply environment overrides. Never fails:
    /// a broken config file is reported and replaced by defaults.
    pub fn load_or_default() -> Self {
        let mut config = match Self::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Override fields from `TGSESSION_*` variables looked up through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup(ENV_API_ID) {
            match raw.trim().parse() {
                Ok(id) => self.api_id = Some(id),
                Err(_) => warn!(value = %raw, "Ignoring non-numeric {}", ENV_API_ID),
            }
        }
        if let Some(url) = lookup(ENV_GATEWAY_URL).filter(|s| !s.trim().is_empty()) {
            self.gateway_url = Some(url.trim().to_string());
        }
        if let Some(dir) = lookup(ENV_SESSIONS_DIR).filter(|s| !s.trim().is_empty()) {
            self.sessions_dir = Some(PathBuf::from(dir.trim()));
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.sessions_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSIONS_DIR))
    }

    pub fn gateway_url(&self) -> &str {
        self.gateway_url.as_deref().unwrap_or(DEFAULT_GATEWAY_URL)
    }

    pub fn log_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.sessions_dir(), PathBuf::from("sessions"));
        assert_eq!(config.gateway_url(), DEFAULT_GATEWAY_URL);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");
        let config = Config {
            api_id: Some(12345),
            sessions_dir: Some(PathBuf::from("/srv/sessions")),
            gateway_url: None,
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_invalid_file_errors() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_API_ID, " 777 "),
            (ENV_GATEWAY_URL, "http://gateway:9000"),
            (ENV_SESSIONS_DIR, ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config {
            api_id: Some(1),
            sessions_dir: Some(PathBuf::from("keep")),
            gateway_url: None,
        };
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_id, Some(777));
        assert_eq!(config.gateway_url(), "http://gateway:9000");
        assert_eq!(config.sessions_dir(), PathBuf::from("keep"));
    }

    #[test]
    fn test_bad_api_id_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == ENV_API_ID).then(|| "abc".to_string()));
        assert_eq!(config.api_id, None);
    }
}
