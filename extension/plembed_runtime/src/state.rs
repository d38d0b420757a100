//! The process-wide runtime state machine.

use std::sync::atomic::{AtomicU8, Ordering};

use log::trace;

/// What the runtime currently allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum State {
    /// The language has not been set up in this process yet.
    NotInitialized,

    /// Database operations may proceed.
    Ready,

    /// A host error was observed and has not been absolved.
    InFailedTransaction,

    /// A transaction boundary is being processed.
    OutsideTransaction,

    /// The process is exiting. Terminal.
    Terminated,
}

impl State {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NotInitialized,
            1 => Self::Ready,
            2 => Self::InFailedTransaction,
            3 => Self::OutsideTransaction,
            _ => Self::Terminated,
        }
    }
}

/// Answer of the "database ready" gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Readiness {
    /// Operations may proceed.
    Ready,

    /// No usable transaction: uninitialized, between transactions or
    /// terminated.
    NoTransaction,

    /// The transaction has failed.
    FailedTransaction,
}

/// Atomic holder of the [`State`].
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl Default for StateCell {
    fn default() -> Self { Self::new() }
}

impl StateCell {
    /// Creates a cell in [`State::NotInitialized`].
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU8::new(State::NotInitialized as u8))
    }

    /// Returns the current state.
    #[must_use]
    pub fn get(&self) -> State { State::from_u8(self.0.load(Ordering::SeqCst)) }

    /// Unconditionally moves to `state` unless the cell is terminated.
    pub fn set(&self, state: State) {
        let previous = self.get();
        if previous == State::Terminated || previous == state {
            return;
        }

        trace!("runtime state {previous:?} -> {state:?}");
        self.0.store(state as u8, Ordering::SeqCst);
    }

    /// Moves from `from` to `to`; returns `false` and changes nothing if the
    /// current state is not `from`.
    pub fn transition(&self, from: State, to: State) -> bool {
        let moved = self
            .0
            .compare_exchange(
                from as u8,
                to as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();

        if moved {
            trace!("runtime state {from:?} -> {to:?}");
        }

        moved
    }

    /// Returns `true` in [`State::Ready`].
    #[must_use]
    pub fn is_ready(&self) -> bool { self.get() == State::Ready }

    /// Returns `true` in [`State::InFailedTransaction`].
    #[must_use]
    pub fn is_failed(&self) -> bool { self.get() == State::InFailedTransaction }

    /// Classifies the current state for the database-ready gate.
    #[must_use]
    pub fn readiness(&self) -> Readiness {
        match self.get() {
            State::Ready => Readiness::Ready,
            State::InFailedTransaction => Readiness::FailedTransaction,
            State::NotInitialized
            | State::OutsideTransaction
            | State::Terminated => Readiness::NoTransaction,
        }
    }
}

#[cfg(test)]
mod tests;
