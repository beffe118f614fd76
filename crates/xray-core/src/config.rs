use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use xray_detect::{WatchPage, WatchPageDef};
use xray_parse::PatternPriority;

use crate::error::XrayError;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub observer: WatchPageDef,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Directory for daily rolling log files. Console only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    #[serde(default)]
    pub pattern_priority: PatternPriority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Per-request timeout for metadata lookups.
    pub timeout_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8787/api".into(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file. Defaults to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Load config: user file if it exists, built-in defaults otherwise.
    /// Sections missing from the user file fall back to their defaults.
    pub fn load() -> Result<Self, XrayError> {
        let user_path = Self::config_path();
        if user_path.exists() {
            Self::load_from(&user_path)
        } else {
            Self::from_toml_str(DEFAULT_CONFIG)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, XrayError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, XrayError> {
        toml::from_str(content).map_err(|e| XrayError::Config(e.to_string()))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), XrayError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| XrayError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Compiled watch-page rules from the `[observer]` section.
    pub fn watch_page(&self) -> Result<WatchPage, XrayError> {
        Ok(WatchPage::new(&self.observer)?)
    }

    /// Database file: `[storage] path` when set, the platform default otherwise.
    pub fn storage_path(&self) -> PathBuf {
        self.storage.path.clone().unwrap_or_else(Self::db_path)
    }

    /// Path to user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Default path to the database file.
    pub fn db_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.data_dir().join("xray.db"))
            .unwrap_or_else(|| PathBuf::from("xray.db"))
    }

    /// Ensure the storage directory exists and return the database path.
    pub fn ensure_db_path(&self) -> Result<PathBuf, XrayError> {
        let path = self.storage_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "xray")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}
