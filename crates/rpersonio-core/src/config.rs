//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which holds the Personio base URL, the last used email address, and an
//! optional employee ID override.
//!
//! Configuration is stored at `~/.config/rpersonio/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config directory paths
const APP_NAME: &str = "rpersonio";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Company Personio URL, e.g. `https://acme.personio.de`
    pub base_url: Option<String>,
    pub email: Option<String>,
    /// Used when the employee ID cannot be read from the landing page
    pub employee_id: Option<i64>,
    /// Default output format ("json" or "yaml")
    pub output: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Base URL, or an error explaining how to set one.
    pub fn require_base_url(&self) -> Result<&str> {
        self.base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No Personio URL configured. Pass --base-url, set PERSONIO_BASE_URL, \
                     or add \"base_url\" to the config file"
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("rpersonio-test-{}", uuid::Uuid::new_v4()))
            .join(CONFIG_FILE)
    }

    #[test]
    fn test_load_missing_file_gives_default() {
        let config = Config::load_from(&temp_config_path()).expect("load");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_config_path();
        let config = Config {
            base_url: Some("https://acme.personio.de".to_string()),
            email: Some("jane@example.com".to_string()),
            employee_id: Some(991824),
            output: Some("yaml".to_string()),
        };
        config.save_to(&path).expect("save");

        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(loaded, config);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_partial_file_parses() {
        let config: Config =
            serde_json::from_str(r#"{"base_url": "https://acme.personio.de"}"#).expect("parse");
        assert_eq!(config.base_url.as_deref(), Some("https://acme.personio.de"));
        assert!(config.email.is_none());
    }

    #[test]
    fn test_require_base_url() {
        assert!(Config::default().require_base_url().is_err());
        let blank = Config {
            base_url: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(blank.require_base_url().is_err());
        let set = Config {
            base_url: Some("https://acme.personio.de".to_string()),
            ..Default::default()
        };
        assert_eq!(set.require_base_url().ok(), Some("https://acme.personio.de"));
    }
}
