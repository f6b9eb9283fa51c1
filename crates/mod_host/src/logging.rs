//! Logging system setup.

use crate::config::LoggingSettings;
use anyhow::{anyhow, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global tracing subscriber. `RUST_LOG` overrides the configured
/// level.
pub fn setup_logging(config: &LoggingSettings) -> Result<()> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if config.json_format {
        registry
            .with(fmt::layer().json().with_file(false).with_line_number(false))
            .try_init()
            .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;
    } else {
        registry
            .with(fmt::layer().with_target(false))
            .try_init()
            .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;
    }

    info!("Logging initialized with level: {}", log_level);
    Ok(())
}
