//! # Mod Loader
//!
//! Discovers plugin types in mod libraries dropped into the application's mod
//! directory, exposes a persisted enable/disable toggle for each one through
//! the host's settings subsystem, and initializes the enabled plugins once,
//! after the host has had a frame to apply persisted settings.
//!
//! ## Pipeline
//!
//! ```text
//! ensure_mod_directory -> scan_modules -> PluginDetector -> ToggleRegistry
//!        -> FrameBarrier::next_frame -> activate_enabled
//! ```
//!
//! Every stage isolates failures: a bad file, a bad type or a failing
//! initializer is logged and skipped, never propagated to the host.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mod_loader::{LoaderConfig, ModLoader, SettingsHost, ToggleSetting, YieldFrame};
//! use std::sync::Arc;
//!
//! struct Settings;
//!
//! impl SettingsHost for Settings {
//!     fn add_setting(&self, toggle: Arc<ToggleSetting>) {
//!         println!("{} = {}", toggle.id(), toggle.value());
//!     }
//! }
//!
//! # async fn demo() -> Result<(), mod_loader::LoaderError> {
//! let settings: Arc<dyn SettingsHost> = Arc::new(Settings);
//! let mut loader = ModLoader::new(LoaderConfig::default(), Some(settings));
//! let report = loader.run(&YieldFrame).await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod config;
pub mod detector;
pub mod error;
pub mod loader;
pub mod module;
pub mod provision;
pub mod registry;
pub mod scanner;
pub mod toggle;

pub use activation::{activate_enabled, ActivationReport, FrameBarrier, YieldFrame};
pub use config::{LoaderConfig, DEFAULT_MOD_DIR_NAME, LOADER_MODULE_NAME};
pub use detector::{detect_plugins, PluginDescriptor, PluginDetector};
pub use error::{InitFault, LoadError, LoaderError, ProvisionError, RegistrationError};
pub use loader::{DiscoveryReport, LoaderState, ModLoader};
pub use module::{
    DylibLoader, ExportedType, InProcessLoader, InitHook, LoadedModule, ModuleDefinition,
    ModuleLoader,
};
pub use provision::{ensure_mod_directory, try_ensure_mod_directory};
pub use registry::{SettingsHost, ToggleRegistry};
pub use scanner::{
    scan_modules, DiagnosticKind, ModuleFile, ScanDiagnostic, ScanReport, MAX_REPORTED_CAUSES,
};
pub use toggle::{toggle_id, ToggleChange, ToggleSetting, RESTART_NOTICE, TOGGLE_ID_PREFIX};

// Re-export the ABI crate so hosts need a single dependency
pub use mod_api;
