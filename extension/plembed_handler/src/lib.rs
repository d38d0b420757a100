//! Sinks for diagnostics that must reach the host without unwinding.
//!
//! Warnings and notices produced while the runtime recovers from a failure
//! (an unclosed subtransaction, an exception raised between transactions, a
//! wrapped epoch counter) are not errors: the current operation continues.
//! Such diagnostics are delivered through a [`Handler`].

use derive_more::{Deref, DerefMut};
use parking_lot::{RwLock, RwLockReadGuard};

/// Receives non-fatal diagnostics emitted by the runtime.
pub trait Handler<T>: Send + Sync {
    /// Delivers one diagnostic.
    fn receive(&self, diagnostic: T);
}

/// Keeps every received diagnostic in arrival order.
#[derive(Debug, Deref, DerefMut)]
pub struct Storage<T: Send + Sync> {
    diagnostics: RwLock<Vec<T>>,
}

impl<T: Send + Sync> Storage<T> {
    /// Creates an empty [`Storage`].
    #[must_use]
    pub const fn new() -> Self { Self { diagnostics: RwLock::new(Vec::new()) } }

    /// Returns a read guard over the collected diagnostics.
    pub fn as_vec(&self) -> RwLockReadGuard<Vec<T>> { self.diagnostics.read() }

    /// Returns the number of collected diagnostics.
    pub fn len(&self) -> usize { self.diagnostics.read().len() }

    /// Returns `true` if nothing has been received.
    pub fn is_empty(&self) -> bool { self.diagnostics.read().is_empty() }
}

impl<T: Send + Sync> Default for Storage<T> {
    fn default() -> Self { Self::new() }
}

impl<T: Send + Sync, U> Handler<U> for Storage<T>
where
    U: Into<T>,
{
    fn receive(&self, diagnostic: U) {
        self.diagnostics.write().push(diagnostic.into());
    }
}

#[cfg(test)]
mod tests;
