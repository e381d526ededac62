//! hk-core: stable foundation for the Hooke analysis engine.
//!
//! Contains:
//! - value (dynamically typed argument/metadata values)
//! - si (unit-carrying column labels + SI pretty printing)
//! - numeric (Real + tolerances + float helpers)
//! - ids (stable compact IDs for arena-owned objects)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod si;
pub mod value;

// Re-exports: nice ergonomics for downstream crates
pub use error::{HkError, HkResult};
pub use ids::*;
pub use numeric::*;
pub use si::{join_data_label, pp_si, split_data_label};
pub use value::{Info, Value};
