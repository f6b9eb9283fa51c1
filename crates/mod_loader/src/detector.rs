//! Plugin detection over loaded modules.

use crate::module::{InitHook, LoadedModule};
use mod_api::PLUGIN_ENTRY_MARKER;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One discovered plugin type.
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    full_name: String,
    module: String,
    module_path: PathBuf,
    init: InitHook,
}

impl PluginDescriptor {
    pub fn new(
        full_name: impl Into<String>,
        module: impl Into<String>,
        module_path: impl AsRef<Path>,
        init: InitHook,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            module: module.into(),
            module_path: module_path.as_ref().to_path_buf(),
            init,
        }
    }

    /// Fully-qualified type identity; unique per process
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn simple_name(&self) -> &str {
        crate::module::simple_name_of(&self.full_name)
    }

    /// Name of the module the plugin came from
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn module_path(&self) -> &Path {
        &self.module_path
    }

    pub fn init(&self) -> &InitHook {
        &self.init
    }
}

/// Finds plugin entry points and remembers every identity it has produced, so
/// repeated detection never yields the same plugin twice.
#[derive(Debug)]
pub struct PluginDetector {
    excluded_module: String,
    seen: HashSet<String>,
}

impl PluginDetector {
    pub fn new(excluded_module: impl Into<String>) -> Self {
        Self {
            excluded_module: excluded_module.into(),
            seen: HashSet::new(),
        }
    }

    /// Descriptors for every new plugin type, in file then declaration order.
    pub fn detect(&mut self, modules: &[LoadedModule]) -> Vec<PluginDescriptor> {
        let mut found = Vec::new();

        for module in modules {
            if module.name() == self.excluded_module {
                debug!("Skipping loader module at {}", module.path().display());
                continue;
            }

            for exported in module.types() {
                if !exported.has_marker(PLUGIN_ENTRY_MARKER) {
                    continue;
                }
                if !exported.kind().is_instantiable() {
                    debug!(
                        "Skipping non-instantiable plugin type {} ({:?})",
                        exported.path(),
                        exported.kind()
                    );
                    continue;
                }
                let Some(init) = exported.init() else {
                    warn!("Plugin type {} has no initializer; skipping", exported.path());
                    continue;
                };
                if !self.seen.insert(exported.path().to_string()) {
                    debug!("Plugin {} already discovered; skipping", exported.path());
                    continue;
                }

                debug!("Discovered plugin {} in {}", exported.path(), module.name());
                found.push(PluginDescriptor::new(
                    exported.path(),
                    module.name(),
                    module.path(),
                    init.clone(),
                ));
            }
        }

        info!("Detected {} plugin(s)", found.len());
        found
    }

    /// Forgets every identity seen so far, for a clean re-scan.
    pub fn reset(&mut self) {
        self.seen.clear();
    }
}

/// One-shot detection with a fresh detector.
pub fn detect_plugins(modules: &[LoadedModule], excluded_module: &str) -> Vec<PluginDescriptor> {
    PluginDetector::new(excluded_module).detect(modules)
}
