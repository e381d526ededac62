use std::path::PathBuf;

use hk_core::HkError;

pub type CurveResult<T> = Result<T, CurveError>;

#[derive(thiserror::Error, Debug)]
pub enum CurveError {
    #[error("no column named '{name}' in block '{block}'")]
    UnknownColumn { block: String, name: String },

    #[error("no block named '{name}' in curve '{curve}'")]
    UnknownBlock { curve: String, name: String },

    #[error("column '{name}' has {got} rows, block '{block}' has {expected}")]
    ShapeMismatch {
        block: String,
        name: String,
        got: usize,
        expected: usize,
    },

    #[error("curve '{curve}' has no data loaded")]
    NotLoaded { curve: String },

    #[error("no driver recognizes {}", path.display())]
    NoDriver { path: PathBuf },

    #[error("malformed file {}: {what}", path.display())]
    Format { path: PathBuf, what: String },

    #[error("index {index} out of range for {what} of length {len}")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("playlist is empty")]
    EmptyPlaylist,

    #[error(transparent)]
    Core(#[from] HkError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
