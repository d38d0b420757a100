//! Process and transaction lifecycle hooks.

use std::sync::atomic::Ordering;

use log::{debug, info};
use plembed_diagnostic::{ErrorRecord, SqlState};
use strum_macros::{EnumIter, IntoStaticStr};

use crate::{
    host::Host, interpreter::Interpreter, runtime::Runtime, state::State,
};

/// A top-level transaction event reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
pub enum TransactionEvent {
    /// The transaction committed.
    Commit,

    /// The transaction aborted.
    Abort,

    /// The transaction was prepared for two-phase commit.
    Prepare,

    /// The transaction is about to commit. Ignored.
    PreCommit,
}

impl TransactionEvent {
    /// Returns `true` for events that end the transaction.
    #[must_use]
    pub const fn ends_transaction(self) -> bool {
        !matches!(self, Self::PreCommit)
    }
}

const BETWEEN_TRANSACTIONS: &str = "unexpected error between transactions";

impl<H: Host, I: Interpreter> Runtime<H, I> {
    /// Brings the runtime up on first use.
    ///
    /// # Errors
    ///
    /// The language module's setup failed, or the runtime was already shut
    /// down.
    pub fn initialize(&self) -> Result<(), ErrorRecord> {
        let state = self.context().state();

        match state.get() {
            State::NotInitialized => {}
            State::Terminated => {
                return Err(ErrorRecord::error(
                    SqlState::INTERPRETER_ERROR,
                    format!(
                        "{} language was terminated",
                        self.config().language
                    ),
                ))
            }
            _ => return Ok(()),
        }

        state.set(State::Ready);

        if let Err(exception) = self.interpreter().on_entry(self) {
            state.set(State::NotInitialized);

            return Err(self.exception_to_host_error(
                exception,
                SqlState::INTERPRETER_ERROR,
                "language module failed to initialize",
            ));
        }

        info!("{} language initialized", self.config().language);
        Ok(())
    }

    /// The transaction-boundary hook. Advances the epoch, resets the
    /// ledger and clears the live-objects set.
    pub fn on_transaction_event(&self, event: TransactionEvent) {
        let context = self.context();
        let state = context.state();

        let dormant = matches!(
            state.get(),
            State::NotInitialized | State::Terminated
        );
        if !event.ends_transaction() || dormant {
            return;
        }

        debug!("transaction event {}", <&'static str>::from(event));

        if state.is_failed() {
            if let Err(exception) = self.interpreter().run_pending(self) {
                let message = format!(
                    "unexpected {} exception between transactions",
                    self.config().language
                );
                self.emit_as_warning(exception, &message);
            }

            state.set(State::Ready);
        }

        if context.epoch().advance() {
            self.host().receive(ErrorRecord::warning(
                SqlState::INTERPRETER_ERROR,
                "internal transaction counter wrapped",
            ));
        }

        context.ledger().restore(0);
        context.relayed.lock().take();

        let entered = context.entered.swap(false, Ordering::SeqCst);
        state.transition(State::Ready, State::OutsideTransaction);

        if entered || context.live_count() > 0 {
            if let Err(exception) = self.interpreter().on_transaction_exit(self)
            {
                self.emit_as_warning(exception, BETWEEN_TRANSACTIONS);
            }

            let released = context.live.lock().drain();
            debug!("released {} live objects", released.len());
            drop(released);

            if let Err(exception) = self.interpreter().collect_garbage() {
                self.emit_as_warning(exception, BETWEEN_TRANSACTIONS);
            }
        }

        state.transition(State::OutsideTransaction, State::Ready);
    }

    /// The process-exit hook.
    ///
    /// # Errors
    ///
    /// The language module's exit hook raised.
    pub fn on_exit(&self) -> Result<(), ErrorRecord> {
        let state = self.context().state();

        match state.get() {
            State::Terminated => Ok(()),
            State::NotInitialized => {
                self.host().receive(ErrorRecord::warning(
                    SqlState::INTERPRETER_ERROR,
                    "exit callback called, but the language was not \
                     initialized",
                ));
                state.set(State::Terminated);

                Ok(())
            }
            _ => {
                state.set(State::Terminated);

                self.interpreter().on_exit(self).map_err(|exception| {
                    self.exception_to_host_error(
                        exception,
                        SqlState::INTERPRETER_ERROR,
                        "exception occurred during on_proc_exit",
                    )
                })
            }
        }
    }
}
