//! Deferred activation of enabled plugins.

use crate::error::InitFault;
use crate::registry::ToggleRegistry;
use async_trait::async_trait;
use tracing::{error, info};

/// The one suspension point between registration and activation.
///
/// Implementations complete once the host has overlaid persisted setting
/// values onto the freshly registered toggles.
#[async_trait]
pub trait FrameBarrier: Send + Sync {
    async fn next_frame(&self);
}

/// Waits one scheduler turn.
#[derive(Debug, Default, Clone, Copy)]
pub struct YieldFrame;

#[async_trait]
impl FrameBarrier for YieldFrame {
    async fn next_frame(&self) {
        tokio::task::yield_now().await;
    }
}

/// Outcome of one activation pass.
#[derive(Debug, Clone, Default)]
pub struct ActivationReport {
    /// Toggles examined
    pub total: usize,
    /// Toggles that were enabled when read
    pub enabled: usize,
    /// Plugins whose initializer succeeded
    pub initialized: Vec<String>,
    pub failed: Vec<(String, InitFault)>,
}

impl ActivationReport {
    pub fn summary(&self) -> String {
        format!("{}/{} enabled", self.enabled, self.total)
    }
}

/// Initializes every plugin whose toggle is enabled at the moment it is read.
///
/// Toggles are visited in registration order. Each value is read exactly once
/// and recorded on the toggle, so later edits can be reported as needing a
/// restart. Disabled plugins are skipped silently and never counted as failed.
///
/// # Arguments
///
/// * `registry` - Toggles registered during discovery
///
/// # Returns
///
/// An [`ActivationReport`] with the enabled/total counts, the plugins that
/// initialized, and each failure with its [`InitFault`]. A failing or
/// panicking initializer is logged and never stops the pass.
///
/// # Example
///
/// ```rust
/// use mod_loader::{activate_enabled, ToggleRegistry};
///
/// let registry = ToggleRegistry::new();
/// let report = activate_enabled(&registry);
/// assert_eq!(report.summary(), "0/0 enabled");
/// ```
pub fn activate_enabled(registry: &ToggleRegistry) -> ActivationReport {
    let mut report = ActivationReport {
        total: registry.len(),
        ..Default::default()
    };

    for toggle in registry.iter() {
        if !toggle.read_for_activation() {
            info!("Plugin {} is disabled", toggle.descriptor().full_name());
            continue;
        }
        report.enabled += 1;

        let name = toggle.descriptor().full_name().to_string();
        match toggle.descriptor().init().fire() {
            Ok(()) => {
                info!("✅ Plugin {} initialized", name);
                report.initialized.push(name);
            }
            Err(e) => {
                error!("❌ Plugin {} failed to initialize: {}", name, e);
                report.failed.push((name, e));
            }
        }
    }

    info!(
        "🔌 Plugin activation complete: {} ({} initialized, {} failed)",
        report.summary(),
        report.initialized.len(),
        report.failed.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::PluginDescriptor;
    use crate::module::InitHook;
    use crate::registry::SettingsHost;
    use crate::toggle::ToggleSetting;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct NullHost;

    impl SettingsHost for NullHost {
        fn add_setting(&self, _toggle: Arc<ToggleSetting>) {}
    }

    fn counting(full_name: &str, calls: &Arc<AtomicUsize>) -> PluginDescriptor {
        let calls = calls.clone();
        PluginDescriptor::new(
            full_name,
            "alpha",
            "/mods/alpha.so",
            InitHook::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
    }

    #[test]
    fn test_only_enabled_plugins_initialize() {
        let foo_calls = Arc::new(AtomicUsize::new(0));
        let baz_calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToggleRegistry::new();
        registry
            .register_all(
                Some(&NullHost),
                vec![counting("alpha::Foo", &foo_calls), counting("alpha::Baz", &baz_calls)],
            )
            .unwrap();
        registry.get("mod_loader.plugins.alpha::Baz").unwrap().load_value(false);

        let report = activate_enabled(&registry);

        assert_eq!(foo_calls.load(Ordering::SeqCst), 1);
        assert_eq!(baz_calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.summary(), "1/2 enabled");
        assert_eq!(report.initialized, vec!["alpha::Foo"]);
        assert!(report.failed.is_empty());
    }

    #[test]
    fn test_failures_do_not_stop_activation() {
        let after_calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToggleRegistry::new();
        registry
            .register_all(
                Some(&NullHost),
                vec![
                    PluginDescriptor::new(
                        "alpha::Broken",
                        "alpha",
                        "/mods/alpha.so",
                        InitHook::new(|| panic!("init exploded")),
                    ),
                    PluginDescriptor::new(
                        "alpha::Refuses",
                        "alpha",
                        "/mods/alpha.so",
                        InitHook::new(|| {
                            Err(InitFault::Failed {
                                status: 1,
                                reason: "missing greeting table".to_string(),
                            })
                        }),
                    ),
                    counting("alpha::After", &after_calls),
                ],
            )
            .unwrap();

        let report = activate_enabled(&registry);

        assert_eq!(after_calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.enabled, 3);
        assert_eq!(report.initialized, vec!["alpha::After"]);
        assert_eq!(report.failed.len(), 2);
        assert!(matches!(report.failed[0].1, InitFault::Panicked(_)));
    }

    #[tokio::test]
    async fn test_yield_frame_completes() {
        YieldFrame.next_frame().await;
    }
}
