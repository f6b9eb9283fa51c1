//! Configuration management for the mod host.
//!
//! Settings come from a TOML file; command-line arguments override them.

use anyhow::{Context, Result};
use mod_loader::{LoaderConfig, DEFAULT_MOD_DIR_NAME};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub loader: LoaderSettings,
    #[serde(default)]
    pub settings: SettingsFileSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Where mods live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderSettings {
    /// Application root; defaults to the executable's directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_root: Option<String>,
    /// Mod directory name under the application root
    #[serde(default = "default_mod_dir_name")]
    pub mod_dir_name: String,
    /// Module file extension; defaults to the platform's library extension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

fn default_mod_dir_name() -> String {
    DEFAULT_MOD_DIR_NAME.to_string()
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            app_root: None,
            mod_dir_name: default_mod_dir_name(),
            extension: None,
        }
    }
}

/// Persisted toggle values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsFileSettings {
    /// Relative paths resolve against the application root
    #[serde(default = "default_settings_file")]
    pub file: String,
}

fn default_settings_file() -> String {
    "mod_settings.toml".to_string()
}

impl Default for SettingsFileSettings {
    fn default() -> Self {
        Self {
            file: default_settings_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file, writing out the defaults first if
    /// the file does not exist.
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config: AppConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    pub fn loader_config(&self) -> LoaderConfig {
        let mut config = match &self.loader.app_root {
            Some(root) => LoaderConfig::with_root(root),
            None => LoaderConfig::default(),
        };
        config.mod_dir_name = self.loader.mod_dir_name.clone();
        if let Some(extension) = &self.loader.extension {
            config.extension = extension.trim_start_matches('.').to_string();
        }
        config
    }

    /// Location of the persisted toggle file.
    pub fn settings_path(&self, app_root: &Path) -> PathBuf {
        let file = PathBuf::from(&self.settings.file);
        if file.is_absolute() {
            file
        } else {
            app_root.join(file)
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let name = &self.loader.mod_dir_name;
        if name.is_empty() {
            return Err("Mod directory name cannot be empty".to_string());
        }
        if name.contains('/') || name.contains('\\') {
            return Err(format!("Mod directory name must be a single path segment: {}", name));
        }

        if let Some(extension) = &self.loader.extension {
            if extension.trim_start_matches('.').is_empty() {
                return Err("Module extension cannot be empty".to_string());
            }
        }

        if self.settings.file.is_empty() {
            return Err("Settings file cannot be empty".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
