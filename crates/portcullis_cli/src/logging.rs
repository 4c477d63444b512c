//! Log subscriber setup.

use crate::config::{LogConfig, LogFormat};
use color_eyre::eyre::{eyre, Result, WrapErr};
use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, falling back to the configured level
///
/// # Errors
///
/// Returns error if the configured level is not a valid filter directive
pub fn filter(config: &LogConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .wrap_err_with(|| format!("invalid log level '{}'", config.level)),
    }
}

/// Install the global subscriber, writing to stderr
///
/// # Errors
///
/// Returns error on an invalid level or if a subscriber is already installed
pub fn init(config: &LogConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(config)?)
        .with_writer(std::io::stderr);

    match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|err| eyre!("failed to initialize logging: {}", err))
}
