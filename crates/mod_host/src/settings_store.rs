//! The host's settings subsystem: owns every plugin toggle and persists their
//! values to a TOML file.

use anyhow::{Context, Result};
use dashmap::DashMap;
use mod_loader::{SettingsHost, ToggleChange, ToggleSetting};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// On-disk layout: `[toggles] "<id>" = true|false`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedSettings {
    #[serde(default)]
    toggles: BTreeMap<String, bool>,
}

pub struct SettingsStore {
    path: PathBuf,
    toggles: DashMap<String, Arc<ToggleSetting>>,
    /// Values read from disk, including ids of plugins that are not installed
    persisted: DashMap<String, bool>,
}

impl SettingsStore {
    /// Opens the store backed by `path`. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut settings = PersistedSettings::default();

        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            settings = toml::from_str(&content)
                .with_context(|| format!("Failed to parse settings in {}", path.display()))?;
            debug!("Read {} persisted toggle(s)", settings.toggles.len());
        }

        Ok(Self {
            path,
            toggles: DashMap::new(),
            persisted: settings.toggles.into_iter().collect(),
        })
    }

    /// Like [`SettingsStore::open`], but a file that cannot be read or parsed
    /// is moved aside and replaced by an empty store. Plugins fall back to
    /// their default values.
    pub fn open_or_empty(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::open(path) {
            Ok(store) => store,
            Err(e) => {
                error!("{:#}; starting with default plugin settings", e);

                let mut backup = path.as_os_str().to_owned();
                backup.push(".corrupt");
                match std::fs::rename(path, &backup) {
                    Ok(()) => warn!("Moved unreadable settings to {}", Path::new(&backup).display()),
                    Err(e) => warn!("Failed to move unreadable settings aside: {}", e),
                }

                Self {
                    path: path.to_path_buf(),
                    toggles: DashMap::new(),
                    persisted: DashMap::new(),
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overlays persisted values onto registered toggles. Returns how many
    /// toggles took a persisted value.
    pub fn apply_persisted(&self) -> usize {
        let mut applied = 0;
        for entry in self.toggles.iter() {
            if let Some(value) = self.persisted.get(entry.key()) {
                entry.value().load_value(*value);
                applied += 1;
            }
        }
        debug!("Applied {} persisted toggle value(s)", applied);
        applied
    }

    pub fn get(&self, id: &str) -> Option<Arc<ToggleSetting>> {
        self.toggles.get(id).map(|entry| entry.value().clone())
    }

    /// Registered toggles, sorted by id.
    pub fn toggles(&self) -> Vec<Arc<ToggleSetting>> {
        let mut toggles: Vec<_> = self.toggles.iter().map(|e| e.value().clone()).collect();
        toggles.sort_by(|a, b| a.id().cmp(b.id()));
        toggles
    }

    /// User edit of a registered toggle. Returns `None` for unknown ids.
    pub fn set(&self, id: &str, value: bool) -> Option<ToggleChange> {
        let toggle = self.get(id)?;
        let change = toggle.set_value(value);
        self.persisted.insert(id.to_string(), value);
        Some(change)
    }

    /// Writes every known value to disk: current toggle values plus persisted
    /// entries for plugins that are not installed right now.
    pub fn save(&self) -> Result<()> {
        let mut settings = PersistedSettings::default();
        for entry in self.persisted.iter() {
            settings.toggles.insert(entry.key().clone(), *entry.value());
        }
        for entry in self.toggles.iter() {
            settings.toggles.insert(entry.key().clone(), entry.value().value());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let content = toml::to_string_pretty(&settings)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))?;
        info!(
            "Saved {} toggle value(s) to {}",
            settings.toggles.len(),
            self.path.display()
        );
        Ok(())
    }
}

impl SettingsHost for SettingsStore {
    fn add_setting(&self, toggle: Arc<ToggleSetting>) {
        if self.toggles.insert(toggle.id().to_string(), toggle.clone()).is_some() {
            warn!("Replacing existing setting {}", toggle.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mod_loader::{InitHook, PluginDescriptor};
    use tempfile::TempDir;

    fn toggle(full_name: &str) -> Arc<ToggleSetting> {
        Arc::new(ToggleSetting::new(PluginDescriptor::new(
            full_name,
            "alpha",
            "/mods/alpha.so",
            InitHook::new(|| Ok(())),
        )))
    }

    #[test]
    fn test_persisted_values_survive_a_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");

        let store = SettingsStore::open(&path).unwrap();
        store.add_setting(toggle("alpha::Foo"));
        store.add_setting(toggle("alpha::Baz"));
        assert!(store.set("mod_loader.plugins.alpha::Baz", false).is_some());
        store.save().unwrap();

        let reopened = SettingsStore::open(&path).unwrap();
        let foo = toggle("alpha::Foo");
        let baz = toggle("alpha::Baz");
        reopened.add_setting(foo.clone());
        reopened.add_setting(baz.clone());

        assert!(baz.value());
        assert_eq!(reopened.apply_persisted(), 2);
        assert!(foo.value());
        assert!(!baz.value());
    }

    #[test]
    fn test_uninstalled_plugin_values_are_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[toggles]\n\"mod_loader.plugins.gone::Old\" = false\n").unwrap();

        let store = SettingsStore::open(&path).unwrap();
        store.add_setting(toggle("alpha::Foo"));
        store.save().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("gone::Old"));
        assert!(content.contains("alpha::Foo"));
    }

    #[test]
    fn test_unknown_id_is_not_set() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::open(dir.path().join("settings.toml")).unwrap();
        assert!(store.set("mod_loader.plugins.nope::Nope", true).is_none());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[toggles\n").unwrap();
        assert!(SettingsStore::open(&path).is_err());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[toggles\n").unwrap();

        let store = SettingsStore::open_or_empty(&path);
        let foo = toggle("alpha::Foo");
        store.add_setting(foo.clone());
        assert_eq!(store.apply_persisted(), 0);
        assert!(foo.value());

        // The broken file is kept for inspection and a fresh one is written
        assert!(dir.path().join("settings.toml.corrupt").exists());
        store.save().unwrap();
        assert!(SettingsStore::open(&path).is_ok());
    }
}
