//! The host's frame barrier.

use crate::settings_store::SettingsStore;
use async_trait::async_trait;
use mod_loader::FrameBarrier;
use std::sync::Arc;
use tracing::debug;

/// Completes one frame after registration, once persisted toggle values have
/// been applied to the freshly registered settings.
pub struct HostFrame {
    store: Arc<SettingsStore>,
}

impl HostFrame {
    pub fn new(store: Arc<SettingsStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl FrameBarrier for HostFrame {
    async fn next_frame(&self) {
        tokio::task::yield_now().await;
        let applied = self.store.apply_persisted();
        debug!("Frame complete; {} persisted value(s) applied", applied);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mod_loader::{InitHook, PluginDescriptor, SettingsHost, ToggleSetting};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_frame_applies_persisted_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[toggles]\n\"mod_loader.plugins.alpha::Foo\" = false\n").unwrap();

        let store = Arc::new(SettingsStore::open(&path).unwrap());
        let toggle = Arc::new(ToggleSetting::new(PluginDescriptor::new(
            "alpha::Foo",
            "alpha",
            "/mods/alpha.so",
            InitHook::new(|| Ok(())),
        )));
        store.add_setting(toggle.clone());
        assert!(toggle.value());

        HostFrame::new(store).next_frame().await;
        assert!(!toggle.value());
    }
}
