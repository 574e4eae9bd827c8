use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Environment variable that overrides `api.base_url`.
pub const API_URL_ENV: &str = "XEMPHIM_API_URL";

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub notifications: NotificationsConfig,
    pub player: PlayerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub poll_interval_secs: u64,
}

/// Substring tables used by the embedded player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Video hosts whose embeds are neither sandboxed nor navigation-filtered.
    pub trusted_cdns: Vec<String>,
    pub allowed_navigation: Vec<String>,
    pub blocked_keywords: Vec<String>,
}

impl AppConfig {
    /// Load config: user file (if exists) merged over built-in defaults.
    pub fn load() -> Result<Self, CoreError> {
        let user_path = Self::config_path();
        let mut config = if user_path.exists() {
            let user_str = std::fs::read_to_string(&user_path)
                .map_err(|e| CoreError::Config(e.to_string()))?;
            Self::from_toml(&user_str)?
        } else {
            Self::from_toml(DEFAULT_CONFIG)?
        };

        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                config.api.base_url = url;
            }
        }
        Ok(config)
    }

    /// Parse a config document. Sections missing from `toml_str` keep their defaults.
    pub fn from_toml(toml_str: &str) -> Result<Self, CoreError> {
        let mut base: toml::Value =
            toml::from_str(DEFAULT_CONFIG).map_err(|e| CoreError::Config(e.to_string()))?;
        let overlay: toml::Value =
            toml::from_str(toml_str).map_err(|e| CoreError::Config(e.to_string()))?;
        merge(&mut base, overlay);
        base.try_into()
            .map_err(|e: toml::de::Error| CoreError::Config(e.to_string()))
    }

    /// Save current config to the user config file.
    pub fn save(&self) -> Result<(), CoreError> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Path to user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Path to the database file.
    pub fn db_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.data_dir().join("xemphim.db"))
            .unwrap_or_else(|| PathBuf::from("xemphim.db"))
    }

    /// Ensure the data directory exists and return the DB path.
    pub fn ensure_db_path() -> Result<PathBuf, CoreError> {
        let path = Self::db_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "xemphim")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}

/// Recursively overlay `other` onto `base`; tables merge, everything else replaces.
fn merge(base: &mut toml::Value, other: toml::Value) {
    match (base, other) {
        (toml::Value::Table(base), toml::Value::Table(other)) => {
            for (key, value) in other {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, other) => *base = other,
    }
}
