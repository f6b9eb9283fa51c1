use mod_loader::mod_api::{PluginEntry, PluginError, TypeKind, PLUGIN_ENTRY_MARKER};
use mod_loader::{
    DiagnosticKind, ExportedType, InProcessLoader, InitFault, LoaderConfig, LoaderState,
    ModLoader, ModuleDefinition, SettingsHost, ToggleSetting, YieldFrame,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

static GREETER_INITS: AtomicUsize = AtomicUsize::new(0);
static WEATHER_INITS: AtomicUsize = AtomicUsize::new(0);

struct Greeter;

impl PluginEntry for Greeter {
    fn initialize() -> Result<(), PluginError> {
        GREETER_INITS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Plugin;

impl PluginEntry for Plugin {
    fn initialize() -> Result<(), PluginError> {
        WEATHER_INITS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Stubborn;

impl PluginEntry for Stubborn {
    fn initialize() -> Result<(), PluginError> {
        Err(PluginError::MissingResource("greeting table".to_string()))
    }
}

#[derive(Default)]
struct Settings {
    toggles: Mutex<Vec<Arc<ToggleSetting>>>,
}

impl SettingsHost for Settings {
    fn add_setting(&self, toggle: Arc<ToggleSetting>) {
        self.toggles.lock().unwrap().push(toggle);
    }
}

fn config_for(root: &Path) -> LoaderConfig {
    LoaderConfig {
        extension: "so".to_string(),
        ..LoaderConfig::with_root(root)
    }
}

fn drop_file(config: &LoaderConfig, name: &str) {
    std::fs::create_dir_all(config.mod_directory()).unwrap();
    std::fs::write(config.mod_directory().join(name), b"").unwrap();
}

#[tokio::test]
async fn corrupt_module_does_not_hide_other_plugins() {
    let root = TempDir::new().unwrap();
    let config = config_for(root.path());
    drop_file(&config, "a_corrupt.so");
    drop_file(&config, "b_greeter.so");
    drop_file(&config, "c_weather.so");
    drop_file(&config, "notes.txt");

    let module_loader = InProcessLoader::new()
        .with_module("a_corrupt.so", ModuleDefinition::new("corrupt").faulty("truncated image"))
        .with_module(
            "b_greeter.so",
            ModuleDefinition::new("greeter")
                .plugin::<Greeter>()
                .plugin::<Stubborn>()
                .export(
                    ExportedType::new("greeter::BasePlugin", TypeKind::Abstract)
                        .with_marker(PLUGIN_ENTRY_MARKER),
                )
                .export(ExportedType::new("greeter::Phrases", TypeKind::Struct)),
        )
        .with_module("c_weather.so", ModuleDefinition::new("weather").plugin::<Plugin>());

    let settings = Arc::new(Settings::default());
    let mut loader = ModLoader::with_loader(
        config,
        module_loader,
        Some(settings.clone() as Arc<dyn SettingsHost>),
    );

    let discovery = loader.discover().unwrap();
    assert_eq!(discovery.modules, 2);
    assert_eq!(discovery.plugins, 3);
    assert_eq!(discovery.diagnostics.len(), 1);
    assert_eq!(discovery.diagnostics[0].kind, DiagnosticKind::Fault);

    let report = loader.activate().unwrap();
    assert_eq!(report.summary(), "3/3 enabled");
    assert_eq!(report.initialized.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert!(matches!(report.failed[0].1, InitFault::Error(_)));
    assert_eq!(GREETER_INITS.load(Ordering::SeqCst), 1);
    assert_eq!(WEATHER_INITS.load(Ordering::SeqCst), 1);

    // The generic `Plugin` type is shown under its module's name
    let toggles = settings.toggles.lock().unwrap();
    let categories: Vec<_> = toggles.iter().map(|t| t.category().to_string()).collect();
    assert_eq!(categories, vec!["Greeter", "Stubborn", "weather"]);
    assert!(toggles.iter().all(|t| t.id().starts_with("mod_loader.plugins.")));
}

#[tokio::test]
async fn absent_mod_directory_is_created_and_scan_is_empty() {
    let root = TempDir::new().unwrap();
    let config = config_for(root.path());
    assert!(!config.mod_directory().exists());

    let mut loader = ModLoader::with_loader(
        config.clone(),
        InProcessLoader::new(),
        Some(Arc::new(Settings::default()) as Arc<dyn SettingsHost>),
    );
    let report = loader.run(&YieldFrame).await.unwrap();

    assert!(config.mod_directory().is_dir());
    assert_eq!(report.summary(), "0/0 enabled");
    assert_eq!(loader.state(), LoaderState::Activated);
}

#[tokio::test]
async fn flipping_a_toggle_after_activation_needs_restart() {
    let root = TempDir::new().unwrap();
    let config = config_for(root.path());
    drop_file(&config, "late.so");

    let module_loader = InProcessLoader::new().with_module(
        "late.so",
        ModuleDefinition::new("late").export(ExportedType::plugin(
            "late::Watcher",
            mod_loader::InitHook::new(|| Ok(())),
        )),
    );
    let settings = Arc::new(Settings::default());
    let mut loader = ModLoader::with_loader(
        config,
        module_loader,
        Some(settings.clone() as Arc<dyn SettingsHost>),
    );
    loader.run(&YieldFrame).await.unwrap();

    let toggle = loader.registry().get("mod_loader.plugins.late::Watcher").unwrap();
    let change = toggle.set_value(false);

    assert!(change.restart_required);
    assert_eq!(toggle.activated_value(), Some(true));
    // Nothing is unloaded or re-run
    assert!(toggle.descriptor().init().has_fired());
}
