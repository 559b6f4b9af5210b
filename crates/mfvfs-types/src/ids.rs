//! Typed identifiers for entries in the virtual filesystem arena.
//!
//! `EntryId` is an opaque slot number. IDs are handed out monotonically by
//! the tree that owns them and are never reused, so a stale ID held across a
//! suspension point resolves to "gone" instead of to an unrelated entry.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Arena slot of an entry in an entry tree.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(u64);

impl EntryId {
    /// The root directory of every tree.
    pub const ROOT: EntryId = EntryId(0);

    /// Wrap a raw slot number.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw slot number.
    pub fn as_raw(&self) -> u64 {
        self.0
    }

    /// Check if this is the root slot.
    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }

    /// The ID that follows this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({})", self.0)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
