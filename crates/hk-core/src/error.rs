use thiserror::Error;

pub type HkResult<T> = Result<T, HkError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HkError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },

    #[error("Index out of bounds: {what} (index={index}, len={len})")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Cannot convert {value:?} to {target}")]
    Conversion { value: String, target: &'static str },
}
