//! Tracing subscriber setup for the `viewstats` binary.

use crate::core::config::LoggingConfig;
use crate::core::{Result, StatsError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable that overrides the configured filter.
pub const LOG_ENV_VAR: &str = "VIEWSTATS_LOG";

/// Filter directive used when `VIEWSTATS_LOG` is unset.
pub fn default_directive(config: &LoggingConfig, debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        config.level.as_str()
    }
}

/// Initialize the global subscriber, writing to stderr so command output
/// stays machine-readable. Fails if one is already installed.
pub fn init(config: &LoggingConfig, debug: bool) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config, debug)));

    let fmt_layer = if config.structured {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .compact()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| StatsError::config(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}
