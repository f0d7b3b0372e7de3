//! Tracing subscriber setup for the kioskrag binary
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the binary so embedders of the crate keep control of their output.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::errors::{PipelineError, Result};

/// Build the filter: `RUST_LOG` wins, then the configured directive, raised
/// by `-v` flags.
pub fn env_filter(config: &LoggingConfig, verbosity: u8) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let directive = match verbosity {
        0 => config.filter.clone(),
        1 => "kioskrag=debug,info".to_string(),
        _ => "trace".to_string(),
    };

    EnvFilter::try_new(&directive)
        .map_err(|e| PipelineError::Config(format!("Invalid log filter '{}': {}", directive, e)))
}

/// Install the global subscriber. Logs go to stderr so answers on stdout
/// stay clean.
pub fn init(config: &LoggingConfig, verbosity: u8, json: bool) -> Result<()> {
    let filter = env_filter(config, verbosity)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json || config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };

    installed.map_err(|e| PipelineError::Internal(format!("Failed to install logger: {}", e)))
}
