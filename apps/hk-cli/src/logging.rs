use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

use crate::error::{CliError, Result};

/// Stderr logging: warnings and errors, or everything down to DEBUG.
pub fn setup_logging(debug: bool) -> Result<()> {
    let level_filter = if debug { LevelFilter::DEBUG } else { LevelFilter::WARN };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(debug)
        .compact();

    tracing_subscriber::registry()
        .with(level_filter)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| CliError::Logging(e.to_string()))
}
