//! Toggle registration with the host's settings subsystem.

use crate::detector::PluginDescriptor;
use crate::error::RegistrationError;
use crate::toggle::ToggleSetting;
use std::sync::Arc;
use tracing::{debug, error, info};

/// The host's settings subsystem. It owns persistence and presentation; the
/// loader only hands it toggles.
pub trait SettingsHost: Send + Sync {
    fn add_setting(&self, toggle: Arc<ToggleSetting>);
}

/// Every toggle created so far, in registration order.
#[derive(Debug, Default)]
pub struct ToggleRegistry {
    toggles: Vec<Arc<ToggleSetting>>,
}

impl ToggleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and registers the toggle for one plugin. Registering an identity
    /// that already has a toggle returns the existing one.
    pub fn register_toggle(
        &mut self,
        settings: Option<&dyn SettingsHost>,
        descriptor: PluginDescriptor,
    ) -> Result<Arc<ToggleSetting>, RegistrationError> {
        let settings = settings.ok_or(RegistrationError::SettingsUnavailable { discarded: 1 })?;

        let toggle = Arc::new(ToggleSetting::new(descriptor));
        if let Some(existing) = self.get(toggle.id()) {
            debug!("Toggle {} already registered", existing.id());
            return Ok(existing);
        }

        settings.add_setting(toggle.clone());
        debug!(
            "Registered toggle {} [{}]",
            toggle.id(),
            toggle.category()
        );
        self.toggles.push(toggle.clone());
        Ok(toggle)
    }

    /// Registers one toggle per descriptor. Without a settings host nothing is
    /// registered and the whole pass fails.
    pub fn register_all(
        &mut self,
        settings: Option<&dyn SettingsHost>,
        descriptors: Vec<PluginDescriptor>,
    ) -> Result<usize, RegistrationError> {
        let Some(settings) = settings else {
            let e = RegistrationError::SettingsUnavailable {
                discarded: descriptors.len(),
            };
            error!("{}", e);
            return Err(e);
        };

        let before = self.toggles.len();
        for descriptor in descriptors {
            self.register_toggle(Some(settings), descriptor)?;
        }

        let added = self.toggles.len() - before;
        info!("Registered {} plugin toggle(s)", added);
        Ok(added)
    }

    pub fn get(&self, id: &str) -> Option<Arc<ToggleSetting>> {
        self.toggles.iter().find(|t| t.id() == id).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ToggleSetting>> {
        self.toggles.iter()
    }

    pub fn len(&self) -> usize {
        self.toggles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toggles.is_empty()
    }

    /// Drops every toggle, ahead of a re-scan.
    pub fn clear(&mut self) {
        self.toggles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::InitHook;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHost {
        added: Mutex<Vec<String>>,
    }

    impl SettingsHost for RecordingHost {
        fn add_setting(&self, toggle: Arc<ToggleSetting>) {
            self.added.lock().unwrap().push(toggle.id().to_string());
        }
    }

    fn descriptor(full_name: &str) -> PluginDescriptor {
        PluginDescriptor::new(full_name, "alpha", "/mods/alpha.so", InitHook::new(|| Ok(())))
    }

    #[test]
    fn test_registers_with_host_and_registry() {
        let host = RecordingHost::default();
        let mut registry = ToggleRegistry::new();

        let added = registry
            .register_all(Some(&host), vec![descriptor("alpha::Foo"), descriptor("alpha::Baz")])
            .unwrap();

        assert_eq!(added, 2);
        assert_eq!(
            *host.added.lock().unwrap(),
            vec!["mod_loader.plugins.alpha::Foo", "mod_loader.plugins.alpha::Baz"]
        );
        assert!(registry.get("mod_loader.plugins.alpha::Baz").is_some());
    }

    #[test]
    fn test_missing_host_registers_nothing() {
        let mut registry = ToggleRegistry::new();
        let result = registry.register_all(None, vec![descriptor("alpha::Foo"), descriptor("alpha::Baz")]);

        assert!(matches!(
            result,
            Err(RegistrationError::SettingsUnavailable { discarded: 2 })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_zero_plugins_is_not_a_failure() {
        let host = RecordingHost::default();
        let mut registry = ToggleRegistry::new();
        assert_eq!(registry.register_all(Some(&host), Vec::new()).unwrap(), 0);
    }

    #[test]
    fn test_same_identity_registers_once() {
        let host = RecordingHost::default();
        let mut registry = ToggleRegistry::new();

        let first = registry.register_toggle(Some(&host), descriptor("alpha::Foo")).unwrap();
        let second = registry.register_toggle(Some(&host), descriptor("alpha::Foo")).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert_eq!(host.added.lock().unwrap().len(), 1);
    }
}
