//! Per-plugin enable/disable settings.

use crate::detector::PluginDescriptor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use tracing::info;

/// Namespace prefix of every toggle id.
pub const TOGGLE_ID_PREFIX: &str = "mod_loader.plugins.";

/// Type names too generic to identify a plugin on their own. Plugins with one
/// of these simple names are shown under their module's name instead.
pub const GENERIC_TYPE_NAMES: &[&str] = &["Plugin", "Mod", "Main", "Entry", "EntryPoint"];

/// Shown alongside every toggle in the settings UI.
pub const RESTART_NOTICE: &str = "Changes take effect after restarting.";

/// Stable setting id for a plugin identity.
pub fn toggle_id(full_name: &str) -> String {
    format!("{}{}", TOGGLE_ID_PREFIX, full_name)
}

/// Human-readable plugin name: the type's simple name, or the module name when
/// the simple name is a generic placeholder.
pub fn display_name(descriptor: &PluginDescriptor) -> String {
    let simple = descriptor.simple_name();
    if GENERIC_TYPE_NAMES
        .iter()
        .any(|generic| generic.eq_ignore_ascii_case(simple))
    {
        descriptor.module().to_string()
    } else {
        simple.to_string()
    }
}

/// Outcome of a user edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleChange {
    pub previous: bool,
    pub current: bool,
    /// The new value differs from what activation used in this process
    pub restart_required: bool,
}

/// A persisted boolean bound to one plugin. Defaults to enabled.
#[derive(Debug)]
pub struct ToggleSetting {
    id: String,
    category: String,
    label: String,
    descriptor: PluginDescriptor,
    value: AtomicBool,
    activated_with: OnceLock<bool>,
}

impl ToggleSetting {
    pub const DEFAULT_VALUE: bool = true;

    pub fn new(descriptor: PluginDescriptor) -> Self {
        let name = display_name(&descriptor);
        Self {
            id: toggle_id(descriptor.full_name()),
            label: format!("Enable {}", name),
            category: name,
            descriptor,
            value: AtomicBool::new(Self::DEFAULT_VALUE),
            activated_with: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn description(&self) -> &str {
        RESTART_NOTICE
    }

    pub fn default_value(&self) -> bool {
        Self::DEFAULT_VALUE
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    pub fn value(&self) -> bool {
        self.value.load(Ordering::SeqCst)
    }

    /// User edit. Never loads or unloads anything.
    pub fn set_value(&self, value: bool) -> ToggleChange {
        let previous = self.value.swap(value, Ordering::SeqCst);
        let restart_required = self
            .activated_with
            .get()
            .map(|activated| *activated != value)
            .unwrap_or(false);

        if previous != value {
            info!("{} set to {}. {}", self.id, value, RESTART_NOTICE);
        }

        ToggleChange {
            previous,
            current: value,
            restart_required,
        }
    }

    /// Host overlay of a persisted value; not a user edit.
    pub fn load_value(&self, value: bool) {
        self.value.store(value, Ordering::SeqCst);
    }

    /// Value read by activation, once it has run.
    pub fn activated_value(&self) -> Option<bool> {
        self.activated_with.get().copied()
    }

    /// The current value will only apply after a restart.
    pub fn restart_pending(&self) -> bool {
        self.activated_value()
            .map(|activated| activated != self.value())
            .unwrap_or(false)
    }

    /// Reads the value for activation and records it.
    pub(crate) fn read_for_activation(&self) -> bool {
        let value = self.value();
        let _ = self.activated_with.set(value);
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::InitHook;

    fn descriptor(full_name: &str, module: &str) -> PluginDescriptor {
        PluginDescriptor::new(full_name, module, format!("/mods/{}.so", module), InitHook::new(|| Ok(())))
    }

    #[test]
    fn test_toggle_id_is_stable() {
        let first = ToggleSetting::new(descriptor("alpha::Foo", "alpha"));
        let second = ToggleSetting::new(descriptor("alpha::Foo", "renamed_file"));
        assert_eq!(first.id(), "mod_loader.plugins.alpha::Foo");
        assert_eq!(first.id(), second.id());
        assert_ne!(first.id(), toggle_id("alpha::Bar"));
    }

    #[test]
    fn test_generic_names_fall_back_to_module() {
        let generic = ToggleSetting::new(descriptor("weather::Plugin", "weather"));
        assert_eq!(generic.category(), "weather");
        assert_eq!(generic.label(), "Enable weather");

        let named = ToggleSetting::new(descriptor("weather::Forecaster", "weather"));
        assert_eq!(named.category(), "Forecaster");
    }

    #[test]
    fn test_defaults_enabled() {
        let toggle = ToggleSetting::new(descriptor("alpha::Foo", "alpha"));
        assert!(toggle.value());
        assert!(toggle.default_value());
        assert_eq!(toggle.description(), RESTART_NOTICE);
    }

    #[test]
    fn test_restart_required_only_after_activation() {
        let toggle = ToggleSetting::new(descriptor("alpha::Foo", "alpha"));

        let before = toggle.set_value(false);
        assert!(!before.restart_required);
        assert!(before.previous);

        assert!(!toggle.read_for_activation());
        let after = toggle.set_value(true);
        assert!(after.restart_required);
        assert!(toggle.restart_pending());

        // Flipping back to the activated value clears the notice
        assert!(!toggle.set_value(false).restart_required);
        assert!(!toggle.restart_pending());
    }
}
