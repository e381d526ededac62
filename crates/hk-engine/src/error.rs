//! Terminal failure statuses for commands.

use std::backtrace::Backtrace;
use std::fmt::Display;

use hk_analysis::AnalysisError;
use hk_core::HkError;
use hk_curve::CurveError;
use serde::{Deserialize, Serialize};

pub type CommandResult<T> = Result<T, Failure>;

/// Why a command did not succeed. Every error raised inside a command ends
/// up as exactly one of these.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Failure {
    #[error("{0}")]
    Message(String),

    #[error("invalid argument '{argument}': {what}")]
    InvalidArgument { argument: String, what: String },

    #[error("unknown command '{name}'")]
    UnknownCommand { name: String },

    #[error("uncaught exception: {exception}")]
    UncaughtException { exception: String, traceback: String },

    #[error("poor fit: {what}")]
    PoorFit { what: String },

    #[error("prompt cancelled")]
    Cancelled,

    #[error("no response within {seconds} s")]
    Timeout { seconds: f64 },
}

impl Failure {
    pub fn message(what: impl Into<String>) -> Self {
        Failure::Message(what.into())
    }

    pub fn invalid(argument: impl Into<String>, what: impl Into<String>) -> Self {
        Failure::InvalidArgument {
            argument: argument.into(),
            what: what.into(),
        }
    }

    /// Wrap an unexpected error together with the current backtrace.
    pub fn uncaught(error: impl Display) -> Self {
        Failure::UncaughtException {
            exception: error.to_string(),
            traceback: Backtrace::force_capture().to_string(),
        }
    }

    pub fn is_poor_fit(&self) -> bool {
        matches!(self, Failure::PoorFit { .. })
    }
}

impl From<AnalysisError> for Failure {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::PoorFit { what } => Failure::PoorFit { what },
            AnalysisError::InvalidInput { what } => Failure::Message(what),
            AnalysisError::Core(e) => e.into(),
            other => Failure::uncaught(other),
        }
    }
}

impl From<CurveError> for Failure {
    fn from(e: CurveError) -> Self {
        match e {
            CurveError::Io(_) | CurveError::Yaml(_) => Failure::uncaught(e),
            other => Failure::Message(other.to_string()),
        }
    }
}

impl From<HkError> for Failure {
    fn from(e: HkError) -> Self {
        Failure::Message(e.to_string())
    }
}

impl From<std::io::Error> for Failure {
    fn from(e: std::io::Error) -> Self {
        Failure::uncaught(e)
    }
}

impl From<serde_yaml::Error> for Failure {
    fn from(e: serde_yaml::Error) -> Self {
        Failure::uncaught(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poor_fits_stay_poor_fits() {
        let f: Failure = AnalysisError::poor_fit("flat").into();
        assert!(f.is_poor_fit());
        let f: Failure = AnalysisError::Numeric { what: "nan".into() }.into();
        assert!(matches!(f, Failure::UncaughtException { .. }));
    }
}
