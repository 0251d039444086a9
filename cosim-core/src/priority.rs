//! ## cosim-core::priority
//! **Federate priorities used as a pure tie-break**
//!
//! A priority is a byte-sized ordinal in the closed range
//! [`Priority::HIGHEST`] (`0`) ..= [`Priority::LOWEST`] (`100`). Numerically
//! lower values are *better*. [`Priority::compare`] flips the numeric order so
//! that "better priority wins" reads as a max-comparison.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RtiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const HIGHEST: Priority = Priority(0);
    pub const LOWEST: Priority = Priority(100);
    pub const DEFAULT: Priority = Priority(50);

    /// Creates a priority, rejecting values outside `HIGHEST..=LOWEST`.
    pub fn new(value: u8) -> Result<Self, RtiError> {
        if value > Self::LOWEST.0 {
            return Err(RtiError::InvalidPriority(value));
        }
        Ok(Self(value))
    }

    #[inline]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Three-way comparison where the better priority is `Greater`.
    #[inline]
    pub fn compare(a: Priority, b: Priority) -> Ordering {
        b.0.cmp(&a.0)
    }

    /// One step towards [`Priority::HIGHEST`], saturating.
    #[inline]
    pub fn raise(self) -> Priority {
        Priority(self.0.saturating_sub(1))
    }

    /// One step towards [`Priority::LOWEST`], saturating.
    #[inline]
    pub fn lower(self) -> Priority {
        Priority((self.0 + 1).min(Self::LOWEST.0))
    }

    #[inline]
    pub fn is_better_than(self, other: Priority) -> bool {
        Self::compare(self, other) == Ordering::Greater
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for Priority {
    type Error = RtiError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Priority::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
