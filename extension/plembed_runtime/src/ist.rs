//! The internal subtransaction ledger.
//!
//! Interpreted code opens and closes nested host transaction scopes through
//! [`Transaction`] handles. The host only releases scopes innermost first, so
//! the ledger numbers every open scope by its depth and refuses to close any
//! handle that is not the innermost one.

use std::{
    fmt::Display,
    sync::atomic::{AtomicU64, Ordering},
};

use getset::CopyGetters;
use log::{debug, warn};
use plembed_diagnostic::{ErrorRecord, SqlState};

use crate::{
    host::Host,
    state::{State, StateCell},
};

/// Where a [`Transaction`] handle is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HandleState {
    /// Not entered yet.
    #[default]
    New,

    /// Entered and not yet closed.
    Open,

    /// Closed by releasing the scope.
    Committed,

    /// Closed by rolling the scope back.
    Aborted,
}

impl HandleState {
    /// The single character tag used by the host's transaction interface.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::New => ' ',
            Self::Open => 'O',
            Self::Committed => 'C',
            Self::Aborted => 'X',
        }
    }
}

/// A handle owned by interpreted code for one nested scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, CopyGetters)]
#[get_copy = "pub"]
pub struct Transaction {
    /// Depth of the scope when it was opened; zero before it is entered.
    id: u64,

    /// Life-cycle position.
    state: HandleState,
}

impl Transaction {
    /// Creates an unused handle.
    #[must_use]
    pub const fn new() -> Self { Self { id: 0, state: HandleState::New } }

    pub(crate) fn opened(&mut self, id: u64) {
        self.id = id;
        self.state = HandleState::Open;
    }

    pub(crate) fn close(&mut self, state: HandleState) { self.state = state; }
}

/// The ledger operation that was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Operation {
    Begin,
    Commit,
    Abort,
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Begin => "begin",
            Self::Commit => "commit",
            Self::Abort => "abort",
        })
    }
}

/// A refused or failed ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The handle is not the innermost open scope.
    #[error("out-of-order {operation} attempt on subtransaction {id}")]
    OutOfOrder {
        /// Refused operation.
        operation: Operation,
        /// Depth claimed by the handle.
        id: u64,
        /// Depth of the innermost open scope.
        expected: u64,
    },

    /// No scope is open.
    #[error("no current internal subtransaction")]
    NoneRunning {
        /// Refused operation.
        operation: Operation,
    },

    /// The handle's state does not permit the operation.
    #[error("{}", bad_state_message(*operation, *state))]
    BadState {
        /// Refused operation.
        operation: Operation,
        /// State of the handle.
        state: HandleState,
    },

    /// Opening another scope would exceed the limit.
    #[error("too many internal subtransactions")]
    Exhausted {
        /// The configured limit.
        limit: u64,
    },

    /// The commit ran while the transaction had failed; the scope was rolled
    /// back instead.
    #[error("database action attempted while in failed transaction")]
    CommitRedirected {
        /// Depth of the aborted scope.
        id: u64,
    },

    /// The host failed while opening, releasing or rolling back a scope.
    #[error(transparent)]
    Host(ErrorRecord),
}

const fn bad_state_message(
    operation: Operation,
    state: HandleState,
) -> &'static str {
    use HandleState::{Aborted, Committed};
    use Operation::{Abort, Begin, Commit};

    match (operation, state) {
        (Begin, Committed) => "cannot start a committed subtransaction",
        (Begin, Aborted) => "cannot start an aborted subtransaction",
        (Begin, _) => "subtransaction is already open",
        (Commit, Committed) => "subtransaction already committed",
        (Commit, Aborted) => "cannot commit aborted subtransaction",
        (Commit, _) => {
            "cannot commit a subtransaction that has not been started"
        }
        (Abort, Committed) => "cannot abort a committed subtransaction",
        (Abort, Aborted) => "subtransaction was already aborted",
        (Abort, _) => "cannot abort a subtransaction that has not been started",
    }
}

impl LedgerError {
    /// Returns `true` if the failure came from the host rather than from the
    /// ledger's own checks.
    #[must_use]
    pub const fn is_host(&self) -> bool { matches!(self, Self::Host(_)) }

    /// Converts the failure into the host error it is reported as.
    #[must_use]
    pub fn into_record(self) -> ErrorRecord {
        let code = if matches!(self, Self::CommitRedirected { .. }) {
            SqlState::IN_FAILED_SQL_TRANSACTION
        } else {
            SqlState::SAVEPOINT_EXCEPTION
        };
        let record = ErrorRecord::error(code, self.to_string());

        match self {
            Self::Host(host) => host,
            Self::OutOfOrder { expected, .. } => record.with_detail(format!(
                "Subtransaction {expected} was expected to exit next."
            )),
            Self::NoneRunning { operation } => {
                let hint = if operation == Operation::Commit {
                    "Attempt to commit an IST, when none running."
                } else {
                    "Attempt to abort the current IST, when none running."
                };

                record.with_hint(hint)
            }
            Self::BadState { .. } => record,
            Self::Exhausted { limit } => record.with_detail(format!(
                "At most {limit} internal subtransactions may be open."
            )),
            Self::CommitRedirected { id } => record.with_detail(format!(
                "The commit of subtransaction {id} was converted into an abort."
            )),
        }
    }
}

/// Counts the nested scopes opened by interpreted code in the current
/// transaction.
#[derive(Debug)]
pub struct Ledger {
    open_count: AtomicU64,
    limit: u64,
}

impl Default for Ledger {
    fn default() -> Self { Self::new(u64::MAX) }
}

impl Ledger {
    /// Creates an empty ledger admitting at most `limit` open scopes.
    #[must_use]
    pub const fn new(limit: u64) -> Self {
        Self { open_count: AtomicU64::new(0), limit }
    }

    /// Returns the number of open scopes.
    #[must_use]
    pub fn open_count(&self) -> u64 { self.open_count.load(Ordering::SeqCst) }

    /// Re-aligns the count, after [`Self::reset`] or at a transaction
    /// boundary.
    pub fn restore(&self, count: u64) {
        self.open_count.store(count, Ordering::SeqCst);
    }

    /// Opens a nested scope for a handle in `state` and returns its depth.
    ///
    /// # Errors
    ///
    /// [`LedgerError::BadState`] unless `state` is [`HandleState::New`],
    /// [`LedgerError::Exhausted`] at the limit, and [`LedgerError::Host`] if
    /// the host could not open the scope.
    pub fn begin<H: Host + ?Sized>(
        &self,
        host: &H,
        state: HandleState,
    ) -> Result<u64, LedgerError> {
        if state != HandleState::New {
            return Err(LedgerError::BadState {
                operation: Operation::Begin,
                state,
            });
        }

        let count = self.open_count();
        if count >= self.limit || count == u64::MAX {
            return Err(LedgerError::Exhausted { limit: self.limit });
        }

        host.begin_subtransaction().map_err(LedgerError::Host)?;

        let id = count + 1;
        self.restore(id);
        debug!("internal subtransaction {id} opened");

        Ok(id)
    }

    /// Releases the innermost scope, which must be the one numbered `id`.
    ///
    /// When the transaction has failed the scope is rolled back instead and
    /// [`LedgerError::CommitRedirected`] is returned even though the rollback
    /// succeeded.
    ///
    /// # Errors
    ///
    /// See [`LedgerError`].
    pub fn commit<H: Host + ?Sized>(
        &self,
        host: &H,
        runtime: &StateCell,
        id: u64,
        state: HandleState,
    ) -> Result<(), LedgerError> {
        self.check_exit(Operation::Commit, id, state)?;

        if runtime.is_failed() {
            warn!("commit of internal subtransaction {id} redirected to abort");
            self.abort(host, runtime, id, state)?;

            return Err(LedgerError::CommitRedirected { id });
        }

        self.restore(id - 1);
        host.release_subtransaction().map_err(LedgerError::Host)?;
        debug!("internal subtransaction {id} committed");

        Ok(())
    }

    /// Rolls back the innermost scope, which must be the one numbered `id`,
    /// and absolves a failed transaction.
    ///
    /// # Errors
    ///
    /// See [`LedgerError`].
    pub fn abort<H: Host + ?Sized>(
        &self,
        host: &H,
        runtime: &StateCell,
        id: u64,
        state: HandleState,
    ) -> Result<(), LedgerError> {
        self.check_exit(Operation::Abort, id, state)?;

        self.restore(id - 1);
        host.rollback_subtransaction().map_err(LedgerError::Host)?;
        debug!("internal subtransaction {id} aborted");

        runtime.transition(State::InFailedTransaction, State::Ready);

        Ok(())
    }

    /// Rolls back `count` scopes from the top with interrupts held off.
    ///
    /// Never fails: a rollback the host refuses is logged and skipped. The
    /// open count is left to the caller.
    pub fn reset<H: Host + ?Sized>(&self, host: &H, count: u64) {
        host.hold_interrupts();

        for _ in 0..count {
            if let Err(record) = host.rollback_subtransaction() {
                warn!("could not roll back internal subtransaction: {record}");
            }
        }

        host.resume_interrupts();
        debug!("{count} internal subtransactions force-aborted");
    }

    fn check_exit(
        &self,
        operation: Operation,
        id: u64,
        state: HandleState,
    ) -> Result<(), LedgerError> {
        let count = self.open_count();

        if id != count {
            return Err(LedgerError::OutOfOrder {
                operation,
                id,
                expected: count,
            });
        }
        if count == 0 {
            return Err(LedgerError::NoneRunning { operation });
        }
        if state != HandleState::Open {
            return Err(LedgerError::BadState { operation, state });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
