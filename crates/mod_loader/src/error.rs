//! Error types for every stage of the discovery and activation pipeline.

use crate::loader::LoaderState;
use crate::module::LoadedModule;
use std::io::Error as IoError;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to provision the mod directory.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Failed to create mod directory {0}: {1}")]
    CreateDirectory(PathBuf, IoError),

    #[error("Mod path {0} exists but is not a directory")]
    NotADirectory(PathBuf),
}

/// Failure to load a single module file.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file is not a module this loader understands.
    #[error("{path} is not a loadable mod: {reason}")]
    NotAModule { path: PathBuf, reason: String },

    /// The module loaded but some of its exported types did not resolve.
    /// `module` holds whatever did resolve.
    #[error("{} loaded partially: {} exported type(s) failed to resolve", .module.path().display(), .causes.len())]
    PartiallyLoaded {
        module: LoadedModule,
        causes: Vec<String>,
    },

    #[error("Failed to load {path}: {reason}")]
    Fault { path: PathBuf, reason: String },
}

/// Failure of the registration pass as a whole.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Settings subsystem unavailable; {discarded} discovered plugin(s) were not registered")]
    SettingsUnavailable { discarded: usize },
}

/// Failure of a single plugin initializer.
#[derive(Debug, Clone, Error)]
pub enum InitFault {
    #[error("initializer reported failure (status {status}): {reason}")]
    Failed { status: i32, reason: String },

    #[error("initializer returned an error: {0}")]
    Error(String),

    #[error("initializer panicked: {0}")]
    Panicked(String),

    #[error("plugin was already initialized")]
    AlreadyInitialized,
}

/// Errors surfaced by the loader's entry points.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("Mods were already activated for this process")]
    AlreadyActivated,

    #[error("Cannot activate mods before registration completes (loader is {0:?})")]
    NotRegistered(LoaderState),
}
