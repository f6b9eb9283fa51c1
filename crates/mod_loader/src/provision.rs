//! Mod directory provisioning.

use crate::config::LoaderConfig;
use crate::error::ProvisionError;
use std::path::Path;
use tracing::{debug, error, info};

/// Makes sure the mod directory exists, creating it (and its parents) when
/// absent. Never fails: problems are logged and discovery simply finds no
/// modules.
pub fn ensure_mod_directory(config: &LoaderConfig) {
    let dir = config.mod_directory();
    match try_ensure_mod_directory(&dir) {
        Ok(true) => info!("Created mod directory: {}", dir.display()),
        Ok(false) => debug!("Mod directory present: {}", dir.display()),
        Err(e) => error!("{}; continuing without mods", e),
    }
}

/// Creates `dir` if it is missing. Returns `true` when the directory was
/// created by this call.
pub fn try_ensure_mod_directory(dir: &Path) -> Result<bool, ProvisionError> {
    if dir.is_dir() {
        return Ok(false);
    }
    if dir.exists() {
        return Err(ProvisionError::NotADirectory(dir.to_path_buf()));
    }

    std::fs::create_dir_all(dir)
        .map_err(|e| ProvisionError::CreateDirectory(dir.to_path_buf(), e))?;
    Ok(true)
}
