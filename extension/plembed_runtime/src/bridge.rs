//! Translation between host error records and interpreter exceptions.
//!
//! Host errors become [`Exception`]s carrying the original record, and
//! exceptions leaving interpreted code become host errors. A record that
//! travelled host → interpreter → host is re-raised unchanged, with the
//! traceback appended as context, so its SQL-state survives the trip.

use std::sync::atomic::Ordering;

use log::debug;
use plembed_diagnostic::{ErrorRecord, Severity, SqlState};

use crate::{
    exception::{Exception, ExceptionKind, InhibitContext},
    host::Host,
    interpreter::Interpreter,
    runtime::Runtime,
    state::State,
};

const UNFORMATTABLE: &str = "<could not get traceback>";

impl<H: Host, I: Interpreter> Runtime<H, I> {
    /// Converts a host error into an exception.
    ///
    /// Unless `inhibit` is set the transaction is marked as failed;
    /// cancellation and administrator shutdown always mark it. A relay
    /// marker yields the exception parked by [`Self::relay_exception`]. A
    /// pending interrupt takes precedence over `record`.
    #[must_use]
    pub fn host_error_to_exception(
        &self,
        record: ErrorRecord,
        inhibit: bool,
    ) -> Exception {
        let forced = is_interrupt(record.code());

        if !inhibit || forced {
            self.mark_failed(forced);
        }

        let exception = if record.is_relay() {
            self.take_relayed()
        } else {
            Exception::database(record)
        };

        match self.poll_interrupt() {
            Some(interrupt) => {
                self.mark_failed(true);
                Exception::database(interrupt)
            }
            None => exception,
        }
    }

    /// Converts an exception leaving interpreted code into a host error
    /// with the given code and message, using the innermost frame for the
    /// context line.
    #[must_use]
    pub fn exception_to_host_error(
        &self,
        exception: Exception,
        code: SqlState,
        message: &str,
    ) -> ErrorRecord {
        let mut record = if let Some(original) = exception.record() {
            original.clone()
        } else if let Some(interrupt) = self.poll_interrupt() {
            interrupt
        } else if exception.is(&ExceptionKind::KeyboardInterrupt) {
            ErrorRecord::error(
                SqlState::QUERY_CANCELED,
                format!(
                    "interrupt raised by {} interpreter",
                    self.config().language
                ),
            )
        } else {
            ErrorRecord::error(code, message)
        };

        if !self.inhibits_context(&exception) {
            record.push_context(self.error_context(&exception));
        }

        record
    }

    /// Parks `exception` and returns the relay marker.
    #[must_use]
    pub fn relay_exception(&self, exception: Exception) -> ErrorRecord {
        debug!("relaying {exception}");
        *self.context().relayed.lock() = Some(exception);

        ErrorRecord::relay()
    }

    /// Reports an exception that cannot be raised as a warning.
    pub fn emit_as_warning(&self, exception: Exception, message: &str) {
        let record = self
            .exception_to_host_error(
                exception,
                SqlState::INTERPRETER_ERROR,
                message,
            )
            .with_severity(Severity::Warning);

        self.host().receive(record);
    }

    /// Takes a parked exception, if any.
    pub(crate) fn take_relayed(&self) -> Exception {
        self.context()
            .relayed
            .lock()
            .take()
            .unwrap_or_else(|| {
                Exception::runtime("exception relay did not set exception")
            })
    }

    fn mark_failed(&self, interrupt: bool) {
        let state = self.context().state();

        if state.is_failed() {
            if !interrupt {
                self.host().receive(ErrorRecord::warning(
                    SqlState::INTERPRETER_ERROR,
                    "database already in error state",
                ));
            }
            return;
        }

        state.transition(State::Ready, State::InFailedTransaction);
    }

    /// Asks the host once whether an interrupt is pending.
    fn poll_interrupt(&self) -> Option<ErrorRecord> {
        let guard = &self.context().raising_interrupt;
        if guard.swap(true, Ordering::SeqCst) {
            return None;
        }

        let pending = self.host().check_for_interrupts().err();
        guard.store(false, Ordering::SeqCst);

        pending
    }

    fn inhibits_context(&self, exception: &Exception) -> bool {
        match exception.inhibit_context() {
            InhibitContext::Absent => false,
            InhibitContext::Set(inhibit) => *inhibit && exception.is_database(),
            InhibitContext::Unreadable => {
                self.host().receive(ErrorRecord::warning(
                    SqlState::INTERPRETER_ERROR,
                    format!(
                        "could not get \"inhibit_pl_context\" attribute on \
                         \"{}\" exception",
                        exception.kind().name()
                    ),
                ));
                false
            }
        }
    }

    fn error_context(&self, exception: &Exception) -> String {
        let header = format!("[exception from {}]", self.config().language);
        let traceback = self.traceback(exception);

        let frames = self.context().frames.lock();
        let location = frames.last().and_then(|frame| {
            let filename = frame.filename.as_ref()?;
            Some(match frame.description {
                Some(description) => {
                    format!("[{filename} while {description}]")
                }
                None => format!("[{filename}]"),
            })
        });

        match location {
            Some(location) => format!("{header}\n{traceback}\n{location}"),
            None => format!("{header}\n{traceback}"),
        }
    }

    fn traceback(&self, exception: &Exception) -> String {
        self.interpreter()
            .format_exception(exception)
            .or_else(|failure| self.interpreter().format_exception(&failure))
            .unwrap_or_else(|_| UNFORMATTABLE.to_owned())
    }
}

fn is_interrupt(code: SqlState) -> bool {
    code == SqlState::QUERY_CANCELED || code == SqlState::ADMIN_SHUTDOWN
}
