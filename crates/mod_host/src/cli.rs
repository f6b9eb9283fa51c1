//! Command-line interface handling for the mod host.

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::ffi::OsString;
use std::path::PathBuf;

const DEFAULT_CONFIG_FILE: &str = "mod_host.toml";

/// What the host should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    /// Load and activate mods, then wait for shutdown
    Run,
    /// Discover mods and print every plugin toggle
    List,
    Enable(String),
    Disable(String),
}

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for the application root
    pub app_root: Option<PathBuf>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    pub command: HostCommand,
}

fn command() -> Command {
    let toggle_id = Arg::new("id")
        .value_name("ID")
        .help("Toggle id, e.g. mod_loader.plugins.my_mod::MyPlugin")
        .required(true);

    Command::new("mod_host")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Loads plugins from native mods in the application's Mods directory")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_FILE),
        )
        .arg(
            Arg::new("app-root")
                .short('r')
                .long("app-root")
                .value_name("DIR")
                .help("Application root containing the Mods directory"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(ArgAction::SetTrue),
        )
        .subcommand(Command::new("run").about("Load and activate mods (default)"))
        .subcommand(Command::new("list").about("List discovered plugins and their toggles"))
        .subcommand(
            Command::new("enable")
                .about("Enable a plugin on next start")
                .arg(toggle_id.clone()),
        )
        .subcommand(
            Command::new("disable")
                .about("Disable a plugin on next start")
                .arg(toggle_id),
        )
}

impl CliArgs {
    /// Parses the process arguments, exiting with usage on error.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        let toggle = |sub: &ArgMatches| sub.get_one::<String>("id").cloned().unwrap_or_default();
        let command = match matches.subcommand() {
            Some(("list", _)) => HostCommand::List,
            Some(("enable", sub)) => HostCommand::Enable(toggle(sub)),
            Some(("disable", sub)) => HostCommand::Disable(toggle(sub)),
            _ => HostCommand::Run,
        };

        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)),
            app_root: matches.get_one::<String>("app-root").map(PathBuf::from),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            command,
        }
    }
}
