//! Modification clock
//!
//! `ModTime` is a process-wide, monotonically increasing counter. Every data
//! object is stamped with a fresh tick when it is created, and the data store
//! and delivery manager compare ticks to decide what is stale.
//!
//! ## Usage
//!
//! ```
//! use relay_core::ModTime;
//!
//! let a = ModTime::tick();
//! let b = ModTime::tick();
//! assert!(b > a);
//! assert!(ModTime::current() >= b);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static CLOCK: AtomicU64 = AtomicU64::new(0);

/// Modification counter value
///
/// ## Invariants
///
/// - Values returned by [`ModTime::tick`] are unique and strictly increasing
/// - [`ModTime::ZERO`] precedes every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ModTime(u64);

impl ModTime {
    /// Precedes every tick; the value of never-modified items
    pub const ZERO: ModTime = ModTime(0);

    /// Advance the clock and return the new value
    pub fn tick() -> Self {
        ModTime(CLOCK.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Latest value handed out so far
    pub fn current() -> Self {
        ModTime(CLOCK.load(Ordering::SeqCst))
    }

    /// Create from a raw counter value
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        ModTime(raw)
    }

    /// Raw counter value
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Check if this value is newer than another
    #[inline]
    pub fn is_newer_than(&self, other: ModTime) -> bool {
        self.0 > other.0
    }
}

impl std::fmt::Display for ModTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}
