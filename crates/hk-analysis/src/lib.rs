//! hk-analysis: numeric core for force-spectroscopy curves.
//!
//! - peak: noise estimation and the five-stage peak detection pipeline
//! - fit: Levenberg-Marquardt least squares behind the `ModelFitter` trait
//! - polymer: WLC / FJC / FJC-PEG models, fitters and peak extraction
//! - surface: contact point detection (bilinear `wtk` fit, `fmms` baseline)
//! - hull: Quickhull and point-in-hull tests
//! - calculus, poly: finite differences, polynomial least squares
//! - newton, jacobian: scalar root finding, finite difference Jacobians

pub mod calculus;
pub mod error;
pub mod fit;
pub mod hull;
pub mod jacobian;
pub mod newton;
pub mod peak;
pub mod poly;
pub mod polymer;
pub mod surface;

pub use error::{AnalysisError, AnalysisResult};
pub use fit::{FitConfig, FitReport, ModelFitter};
pub use peak::{Peak, PeakSettings, Side, find_peaks};
pub use polymer::{PeakExtraction, PolymerFit, PolymerModel, PolymerSettings, fit_polymer};
pub use surface::{ContactAlgorithm, ContactPoint, SurfaceFitChecks, SurfaceOptions};
