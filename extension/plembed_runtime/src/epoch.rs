//! The transaction epoch.
//!
//! Every host transaction boundary advances the epoch by one. Caches record
//! the epoch they were filled in and are stale as soon as it moves on.

use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

/// A value of the transaction epoch counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(u64);

impl Epoch {
    /// Reserved stamp of caches that never go stale.
    pub const NEVER_STALE: Self = Self(1);

    /// The first epoch of a process, and the value the counter wraps to.
    pub const INITIAL: Self = Self(2);

    /// Creates an epoch from a raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self { Self(value) }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u64 { self.0 }

    /// Returns the next epoch and whether the counter wrapped.
    #[must_use]
    pub const fn successor(self) -> (Self, bool) {
        match self.0.checked_add(1) {
            Some(next) if next > Self::NEVER_STALE.0 => (Self(next), false),
            _ => (Self::INITIAL, true),
        }
    }

    /// Returns `true` if a cache stamped `self` may be used in `current`.
    #[must_use]
    pub fn admits(self, current: Self) -> bool {
        self == Self::NEVER_STALE || self == current
    }
}

/// The process-wide epoch counter.
#[derive(Debug)]
pub struct EpochCounter(AtomicU64);

impl Default for EpochCounter {
    fn default() -> Self { Self::new(Epoch::INITIAL) }
}

impl EpochCounter {
    /// Creates a counter positioned at `epoch`.
    #[must_use]
    pub const fn new(epoch: Epoch) -> Self { Self(AtomicU64::new(epoch.0)) }

    /// Returns the current epoch.
    #[must_use]
    pub fn current(&self) -> Epoch { Epoch(self.0.load(Ordering::SeqCst)) }

    /// Advances to the next epoch; returns `true` if the counter wrapped.
    pub fn advance(&self) -> bool {
        let (next, wrapped) = self.current().successor();
        self.0.store(next.0, Ordering::SeqCst);

        debug!("transaction epoch advanced to {}", next.0);
        wrapped
    }

    #[cfg(test)]
    pub(crate) fn reposition(&self, epoch: Epoch) {
        self.0.store(epoch.0, Ordering::SeqCst);
    }
}
