use std::path::PathBuf;

use hk_engine::{Failure, RegistryError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] Failure),

    #[error("Plugin error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Failed to read script '{path}': {source}", path = path.display())]
    Script {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown user interface '{0}' (available: command line)")]
    UnknownUi(String),

    #[error("Cannot parse '{line}': {what}")]
    Parse { line: String, what: String },

    #[error("The engine stopped unexpectedly")]
    EngineStopped,

    #[error("Logging setup failed: {0}")]
    Logging(String),
}
