//! The discovery and activation pipeline.
//!
//! [`ModLoader`] drives the whole lifecycle:
//!
//! 1. **Discovery** (synchronous): provision the mod directory, scan it, detect
//!    plugin types and register one toggle per plugin with the settings host.
//! 2. **Barrier**: wait one frame so the host can apply persisted settings.
//! 3. **Activation**: initialize every plugin whose toggle is enabled.
//!
//! Activation happens at most once per loader.

use crate::activation::{activate_enabled, ActivationReport, FrameBarrier};
use crate::config::LoaderConfig;
use crate::detector::PluginDetector;
use crate::error::LoaderError;
use crate::module::{DylibLoader, LoadedModule, ModuleLoader};
use crate::provision::ensure_mod_directory;
use crate::registry::{SettingsHost, ToggleRegistry};
use crate::scanner::{scan_modules, ScanDiagnostic};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Lifecycle position of a [`ModLoader`]. States only move forward, except
/// that discovery may be repeated before activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoaderState {
    Uninitialized,
    DirectoryEnsured,
    Scanned,
    Detected,
    Registered,
    Activated,
}

/// Summary of one discovery pass.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Modules that loaded, fully or partially
    pub modules: usize,
    pub diagnostics: Vec<ScanDiagnostic>,
    /// Plugin types detected in this pass
    pub plugins: usize,
    /// Toggles newly registered in this pass
    pub registered: usize,
}

/// Discovers, registers and activates plugins from the mod directory.
pub struct ModLoader<L: ModuleLoader = DylibLoader> {
    config: LoaderConfig,
    module_loader: L,
    settings: Option<Arc<dyn SettingsHost>>,
    detector: PluginDetector,
    registry: ToggleRegistry,
    modules: Vec<LoadedModule>,
    state: LoaderState,
    activated: bool,
}

impl ModLoader<DylibLoader> {
    /// Loader for native mods.
    pub fn new(config: LoaderConfig, settings: Option<Arc<dyn SettingsHost>>) -> Self {
        Self::with_loader(config, DylibLoader::new(), settings)
    }
}

impl<L: ModuleLoader> ModLoader<L> {
    pub fn with_loader(
        config: LoaderConfig,
        module_loader: L,
        settings: Option<Arc<dyn SettingsHost>>,
    ) -> Self {
        let detector = PluginDetector::new(config.excluded_module.clone());
        Self {
            config,
            module_loader,
            settings,
            detector,
            registry: ToggleRegistry::new(),
            modules: Vec::new(),
            state: LoaderState::Uninitialized,
            activated: false,
        }
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToggleRegistry {
        &self.registry
    }

    /// Modules kept from the last scan
    pub fn modules(&self) -> &[LoadedModule] {
        &self.modules
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// Runs the synchronous discovery phase. Repeating it before activation
    /// rebuilds everything from scratch.
    pub fn discover(&mut self) -> Result<DiscoveryReport, LoaderError> {
        if self.activated {
            warn!("Ignoring discovery request: mods are already active");
            return Err(LoaderError::AlreadyActivated);
        }

        if self.state > LoaderState::Uninitialized {
            debug!("Repeating discovery; clearing previous results");
            self.registry.clear();
            self.detector.reset();
            self.modules.clear();
        }

        ensure_mod_directory(&self.config);
        self.state = LoaderState::DirectoryEnsured;

        let scan = scan_modules(
            &self.config.mod_directory(),
            &self.config.extension,
            &self.module_loader,
        );
        self.modules = scan.modules;
        self.state = LoaderState::Scanned;

        let descriptors = self.detector.detect(&self.modules);
        let plugins = descriptors.len();
        self.state = LoaderState::Detected;

        let registered = self
            .registry
            .register_all(self.settings.as_deref(), descriptors)?;
        self.state = LoaderState::Registered;

        info!(
            "📦 Discovery complete: {} mod(s), {} plugin(s), {} diagnostic(s)",
            self.modules.len(),
            plugins,
            scan.diagnostics.len()
        );

        Ok(DiscoveryReport {
            modules: self.modules.len(),
            diagnostics: scan.diagnostics,
            plugins,
            registered,
        })
    }

    /// Initializes every enabled plugin. Succeeds once per loader.
    pub fn activate(&mut self) -> Result<ActivationReport, LoaderError> {
        if self.activated {
            warn!("Ignoring activation request: mods are already active");
            return Err(LoaderError::AlreadyActivated);
        }
        if self.state != LoaderState::Registered {
            return Err(LoaderError::NotRegistered(self.state));
        }

        self.activated = true;
        let report = activate_enabled(&self.registry);
        self.state = LoaderState::Activated;
        Ok(report)
    }

    /// Full lifecycle: discovery, one frame on `barrier`, then activation.
    ///
    /// Discovery ensures the mod directory, scans it, detects plugin types and
    /// registers one toggle per plugin with the settings host. The loader then
    /// waits on `barrier` so the host can overlay persisted toggle values, and
    /// finally initializes each plugin whose toggle is enabled.
    ///
    /// # Arguments
    ///
    /// * `barrier` - Completes once the host has applied persisted settings
    ///
    /// # Returns
    ///
    /// The [`ActivationReport`] of the single activation pass.
    ///
    /// # Errors
    ///
    /// * [`LoaderError::Registration`] if plugins were found but no settings
    ///   host was supplied; nothing is activated
    /// * [`LoaderError::AlreadyActivated`] on any call after the first
    ///   successful activation
    ///
    /// Per-file and per-plugin failures are never errors here; they are
    /// logged and reported.
    ///
    /// # Example
    ///
    /// ```rust
    /// use mod_loader::{LoaderConfig, LoaderError, ModLoader, YieldFrame};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let app_root = tempfile::tempdir().unwrap();
    /// let mut loader = ModLoader::new(LoaderConfig::with_root(app_root.path()), None);
    ///
    /// let report = loader.run(&YieldFrame).await.unwrap();
    /// assert_eq!(report.summary(), "0/0 enabled");
    ///
    /// assert!(matches!(
    ///     loader.run(&YieldFrame).await,
    ///     Err(LoaderError::AlreadyActivated)
    /// ));
    /// # }
    /// ```
    pub async fn run<B>(&mut self, barrier: &B) -> Result<ActivationReport, LoaderError>
    where
        B: FrameBarrier + ?Sized,
    {
        if let Err(e) = self.discover() {
            error!("Mod discovery failed: {}", e);
            return Err(e);
        }

        barrier.next_frame().await;
        self.activate()
    }
}
