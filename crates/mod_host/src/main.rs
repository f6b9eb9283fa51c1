//! Sample host application for the mod loader.
//!
//! Loads configuration, discovers mods in `<app_root>/Mods`, exposes a toggle
//! per plugin through the settings store, activates the enabled plugins and
//! runs until asked to shut down.

mod cli;
mod config;
mod frame;
mod logging;
mod settings_store;
mod signals;

use anyhow::{bail, Context, Result};
use cli::{CliArgs, HostCommand};
use config::AppConfig;
use frame::HostFrame;
use mod_loader::{LoaderConfig, ModLoader, SettingsHost, RESTART_NOTICE};
use settings_store::SettingsStore;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let mut config = AppConfig::load_from_file(&args.config_path).await?;

    // Apply CLI overrides
    if let Some(app_root) = &args.app_root {
        config.loader.app_root = Some(app_root.to_string_lossy().to_string());
    }
    if let Some(log_level) = &args.log_level {
        config.logging.level = log_level.clone();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }

    if let Err(e) = config.validate() {
        bail!("Configuration validation failed: {}", e);
    }

    logging::setup_logging(&config.logging)?;

    let loader_config = config.loader_config();
    let store = Arc::new(SettingsStore::open_or_empty(
        config.settings_path(&loader_config.app_root),
    ));

    match args.command {
        HostCommand::Run => run(loader_config, store).await,
        HostCommand::List => list(loader_config, store),
        HostCommand::Enable(id) => set_toggle(loader_config, store, &id, true),
        HostCommand::Disable(id) => set_toggle(loader_config, store, &id, false),
    }
}

async fn run(loader_config: LoaderConfig, store: Arc<SettingsStore>) -> Result<()> {
    info!("🚀 Starting mod host in {}", loader_config.app_root.display());
    info!("Plugin settings: {}", store.path().display());

    let mut loader = ModLoader::new(loader_config, Some(store.clone() as Arc<dyn SettingsHost>));
    let barrier = HostFrame::new(store.clone());

    match loader.run(&barrier).await {
        Ok(report) => {
            info!(
                "✅ Mods active: {} from {} mod(s) in {}",
                report.summary(),
                loader.modules().len(),
                loader.config().mod_directory().display()
            );
            for (plugin, fault) in &report.failed {
                warn!("{} did not start: {}", plugin, fault);
            }
        }
        // The host keeps running without mods
        Err(e) => error!("Mod loading aborted: {}", e),
    }

    info!("Running; press Ctrl+C to stop");
    signals::wait_for_shutdown()
        .await
        .context("Failed to install signal handlers")?;

    for toggle in store.toggles() {
        if toggle.restart_pending() {
            info!(
                "{} will be {} on next start",
                toggle.id(),
                if toggle.value() { "enabled" } else { "disabled" }
            );
        }
    }

    store.save()?;
    info!("👋 Shutdown complete");
    Ok(())
}

/// Discovery plus the persisted overlay, without activating anything.
fn discover(loader_config: LoaderConfig, store: &Arc<SettingsStore>) -> Result<ModLoader> {
    let mut loader = ModLoader::new(loader_config, Some(store.clone() as Arc<dyn SettingsHost>));
    loader.discover()?;
    store.apply_persisted();
    Ok(loader)
}

fn list(loader_config: LoaderConfig, store: Arc<SettingsStore>) -> Result<()> {
    let loader = discover(loader_config, &store)?;
    let mod_directory = loader.config().mod_directory();

    let toggles = store.toggles();
    if toggles.is_empty() {
        println!(
            "No plugins found in {} ({} mod(s) loaded)",
            mod_directory.display(),
            loader.modules().len()
        );
        return Ok(());
    }

    println!(
        "{} plugin(s) from {} mod(s) in {}",
        toggles.len(),
        loader.modules().len(),
        mod_directory.display()
    );

    for toggle in toggles {
        println!(
            "[{}] {:<24} {} ({})",
            if toggle.value() { "x" } else { " " },
            toggle.category(),
            toggle.id(),
            toggle.descriptor().module_path().display()
        );
    }
    Ok(())
}

fn set_toggle(
    loader_config: LoaderConfig,
    store: Arc<SettingsStore>,
    id: &str,
    value: bool,
) -> Result<()> {
    discover(loader_config, &store)?;

    let Some(change) = store.set(id, value) else {
        bail!("Unknown plugin toggle: {}", id);
    };
    store.save()?;

    if change.previous == change.current {
        println!("{} is already {}", id, if value { "enabled" } else { "disabled" });
    } else {
        println!("{} {}. {}", if value { "Enabled" } else { "Disabled" }, id, RESTART_NOTICE);
    }
    Ok(())
}
