//! Save priorities.
//!
//! Every reconciliation pass carries the trust level of its data source.
//! Higher values win: a field written at priority 215 is not overwritten by
//! a later pass at priority 10 unless the caller explicitly overrides.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trust level of a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(i32);

impl Priority {
    /// Lowest priority; anything may overwrite it.
    pub const MIN: Self = Self(0);

    /// Priority used by the automerger when saving selected scan results.
    pub const AUTOMERGE: Self = Self(205);

    #[must_use]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }

    /// Returns true if a write at `self` may replace a value written at
    /// `existing`.
    #[must_use]
    pub fn may_overwrite(self, existing: Self) -> bool {
        self >= existing
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Self(value)
    }
}
