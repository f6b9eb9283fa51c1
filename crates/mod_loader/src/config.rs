//! Loader configuration.

use std::path::{Path, PathBuf};

/// Default name of the mod directory under the application root.
pub const DEFAULT_MOD_DIR_NAME: &str = "Mods";

/// Module name the loader itself is published under. Types exported from a
/// module with this name are never treated as discoverable mods.
pub const LOADER_MODULE_NAME: &str = "mod_loader";

/// Where to look for mods and what to ignore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Host application's install root
    pub app_root: PathBuf,
    /// Name of the mod directory under `app_root`
    pub mod_dir_name: String,
    /// Module file extension, without the dot
    pub extension: String,
    /// Module whose types are excluded from detection
    pub excluded_module: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            app_root: default_app_root(),
            mod_dir_name: DEFAULT_MOD_DIR_NAME.to_string(),
            extension: std::env::consts::DLL_EXTENSION.to_string(),
            excluded_module: LOADER_MODULE_NAME.to_string(),
        }
    }
}

impl LoaderConfig {
    /// Default configuration rooted at `app_root`.
    pub fn with_root(app_root: impl AsRef<Path>) -> Self {
        Self {
            app_root: app_root.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// `<app_root>/<mod_dir_name>`
    pub fn mod_directory(&self) -> PathBuf {
        self.app_root.join(&self.mod_dir_name)
    }
}

/// Directory containing the running executable, or `.` when it cannot be
/// determined.
pub fn default_app_root() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mod_directory_joins_root_and_name() {
        let config = LoaderConfig::with_root("/opt/game");
        assert_eq!(config.mod_directory(), PathBuf::from("/opt/game/Mods"));
        assert_eq!(config.extension, std::env::consts::DLL_EXTENSION);
        assert_eq!(config.excluded_module, LOADER_MODULE_NAME);
    }
}
