//! Application settings

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Shared data shipped with the dock: default module configs and renderer themes.
pub const DEFAULT_SHARE_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data");

const CURRENT_THEME_DIR: &str = "current_theme";

/// Application-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Version of the config format
    pub version: u32,
    /// Current theme. Defaults to `<data dir>/current_theme`.
    #[serde(default)]
    pub theme_dir: Option<PathBuf>,
    /// Directories scanned for module libraries
    #[serde(default)]
    pub module_dirs: Vec<PathBuf>,
    /// Shared data directory
    #[serde(default)]
    pub share_dir: Option<PathBuf>,
    /// Main config file name, inside the theme
    #[serde(default = "default_main_conf")]
    pub main_conf_file: String,
    #[serde(default)]
    pub screen: ScreenConfig,
    /// Allow the accelerated rendering path
    #[serde(default = "default_true")]
    pub accelerated: bool,
    /// Load modules even when their version checks fail
    #[serde(default)]
    pub easter_eggs: bool,
}

fn default_main_conf() -> String {
    "rg-dock.conf".to_string()
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from_path(&config_path)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_path()?)
    }

    fn project_dirs() -> Result<directories::ProjectDirs> {
        directories::ProjectDirs::from("org", "rg-dock", "rg-dock")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
    }

    /// Get the configuration file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.json"))
    }

    /// Load configuration from a specific file path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a specific file path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Theme directory, falling back to the per-user data directory.
    pub fn resolved_theme_dir(&self) -> Result<PathBuf> {
        match &self.theme_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join(CURRENT_THEME_DIR)),
        }
    }

    pub fn resolved_share_dir(&self) -> PathBuf {
        self.share_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SHARE_DIR))
    }

    pub fn main_conf_path(&self) -> Result<PathBuf> {
        Ok(self.resolved_theme_dir()?.join(&self.main_conf_file))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            theme_dir: None,
            module_dirs: Vec::new(),
            share_dir: None,
            main_conf_file: default_main_conf(),
            screen: ScreenConfig::default(),
            accelerated: true,
            easter_eggs: false,
        }
    }
}

/// Screen the docks and desklets are laid out on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenConfig {
    pub width: i32,
    pub height: i32,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}
