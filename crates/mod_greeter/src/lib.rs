//! A sample mod for `mod_host`.
//!
//! Build it and drop the resulting library into the host's `Mods` directory.
//! It exports two plugins plus a couple of types the loader should ignore.

use mod_api::{declare_mod, PluginEntry, PluginError, PLUGIN_ENTRY_MARKER};
use std::sync::atomic::{AtomicUsize, Ordering};

static GREETINGS: AtomicUsize = AtomicUsize::new(0);

/// Greeting phrases. Not a plugin.
pub struct Phrases;

impl Phrases {
    pub fn hello(name: &str) -> String {
        format!("Hello from {}!", name)
    }
}

/// Base for greeters. Marked, but abstract, so never initialized.
pub trait BaseGreeter {
    fn name(&self) -> &'static str;
}

/// Prints a greeting when activated.
pub struct GreeterPlugin;

impl BaseGreeter for GreeterPlugin {
    fn name(&self) -> &'static str {
        "GreeterPlugin"
    }
}

impl PluginEntry for GreeterPlugin {
    fn initialize() -> Result<(), PluginError> {
        println!("{}", Phrases::hello(GreeterPlugin.name()));
        GREETINGS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub mod farewell {
    use super::*;

    /// Generic type name; listed under the module name in settings.
    pub struct Plugin;

    impl PluginEntry for Plugin {
        fn initialize() -> Result<(), PluginError> {
            println!("Goodbye is registered for shutdown");
            GREETINGS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}

/// How many plugins in this mod have been initialized.
pub fn greetings_sent() -> usize {
    GREETINGS.load(Ordering::SeqCst)
}

declare_mod! {
    module: "greeter",
    plugins: [
        GreeterPlugin => greeter_plugin_init,
        farewell::Plugin => farewell_plugin_init,
    ],
    exports: [
        dyn BaseGreeter: Abstract => PLUGIN_ENTRY_MARKER,
        Phrases: Struct,
    ],
}
