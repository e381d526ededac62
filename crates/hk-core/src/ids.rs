use core::fmt;
use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Compact, stable identifier for arena-owned objects (playlists, curves).
///
/// - `u32` keeps memory small
/// - `NonZero` enables `Option<Id>` to be pointer-optimized
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Id(NonZeroU32);

impl Id {
    /// Create an Id from a 0-based index by storing index+1.
    pub fn from_index(index: usize) -> Self {
        // index+1 saturates instead of wrapping to zero
        let raw = u32::try_from(index)
            .ok()
            .and_then(|i| i.checked_add(1))
            .unwrap_or(u32::MAX);
        Self(NonZeroU32::new(raw).unwrap_or(NonZeroU32::MAX))
    }

    /// Recover the 0-based index.
    pub fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl From<u32> for Id {
    fn from(index: u32) -> Self {
        Self::from_index(index as usize)
    }
}

impl From<Id> for u32 {
    fn from(id: Id) -> Self {
        id.index() as u32
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.index())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Domain-specific ID aliases for clarity (no runtime cost).
pub type PlaylistId = Id;
pub type CurveId = Id;

/// Address of a curve inside the playlist arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CurveRef {
    pub playlist: PlaylistId,
    pub curve: CurveId,
}

impl CurveRef {
    pub fn new(playlist: PlaylistId, curve: CurveId) -> Self {
        Self { playlist, curve }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_round_trip_index() {
        for i in [0_usize, 1, 2, 42, 10_000] {
            let id = Id::from_index(i);
            assert_eq!(id.index(), i);
        }
    }

    #[test]
    fn option_id_is_small() {
        assert_eq!(
            core::mem::size_of::<Id>(),
            core::mem::size_of::<Option<Id>>()
        );
    }

    #[test]
    fn id_serializes_as_index() {
        let id = Id::from_index(7);
        let text = serde_yaml::to_string(&id).unwrap();
        assert_eq!(text.trim(), "7");
        let back: Id = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back, id);
    }
}
