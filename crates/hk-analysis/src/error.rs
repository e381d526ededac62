//! Error types for analysis routines.

use hk_core::HkError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// The model did not converge to an acceptable fit. Filters treat this
    /// as "no peaks" rather than a hard failure.
    #[error("Poor fit: {what}")]
    PoorFit { what: String },

    #[error("Convergence failed: {what}")]
    ConvergenceFailed { what: String },

    #[error("Invalid input: {what}")]
    InvalidInput { what: String },

    #[error("Numeric error: {what}")]
    Numeric { what: String },

    #[error(transparent)]
    Core(#[from] HkError),
}

impl AnalysisError {
    pub fn poor_fit(what: impl Into<String>) -> Self {
        AnalysisError::PoorFit { what: what.into() }
    }

    pub fn is_poor_fit(&self) -> bool {
        matches!(self, AnalysisError::PoorFit { .. })
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
