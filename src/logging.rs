//! Tracing subscriber setup

use crate::config::LoggingConfig;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("invalid log level/filter '{value}': unable to build EnvFilter")]
    EnvFilter {
        value: String,
        #[source]
        source: ParseError,
    },

    #[error("failed to install subscriber: {0}")]
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

/// Build the filter, `RUST_LOG` taking precedence over the configured level
fn env_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|source| LoggingError::EnvFilter {
            value: level.to_string(),
            source,
        }),
    }
}

/// Install the global subscriber; `verbose` forces debug level
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<(), LoggingError> {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter = env_filter(level)?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.format == "json" {
        builder.json().try_init().map_err(LoggingError::Subscriber)
    } else {
        builder.compact().try_init().map_err(LoggingError::Subscriber)
    }
}
