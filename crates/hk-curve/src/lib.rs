//! hk-curve: curves, playlists and command stacks.
//!
//! Contains:
//! - data (column-labelled blocks)
//! - curve (file-backed curve with metadata and a command stack)
//! - playlist (bookmarked curve collections, YAML persistence, LRU window)
//! - command_stack (replayable `CommandMessage` logs)
//! - driver (file-format drivers and the plain-text reference driver)

pub mod command_stack;
pub mod curve;
pub mod data;
pub mod driver;
pub mod error;
pub mod playlist;

pub use command_stack::{CommandMessage, CommandStack, Dispatcher};
pub use curve::Curve;
pub use data::Data;
pub use driver::{Driver, DriverRegistry, TextDriver};
pub use error::{CurveError, CurveResult};
pub use playlist::{PLAYLIST_HEADER, Playlist};
