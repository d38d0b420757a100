//! Relaying host interrupts into running interpreted code.
//!
//! The host's signal handler only flags a request. When interpreted code
//! is executing on behalf of a dispatcher frame, the relay also marks the
//! transaction failed and schedules [`PendingCall::ServiceInterrupt`], which
//! the interpreter runs at its next safe point; the host's pending error
//! then surfaces as an exception inside the interpreted code.

use std::sync::atomic::Ordering;

use log::{debug, trace};
use strum_macros::{EnumIter, IntoStaticStr};

use crate::{
    exception::Exception,
    host::Host,
    interpreter::Interpreter,
    runtime::Runtime,
    state::State,
};

/// An asynchronous request delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
pub enum Signal {
    /// Query cancellation.
    Interrupt,

    /// Backend termination.
    Terminate,
}

/// A call the runtime asks the interpreter to run at its next safe point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingCall {
    /// Runs [`crate::session::Session::service_interrupt`].
    ServiceInterrupt,
}

impl<H: Host, I: Interpreter> Runtime<H, I> {
    /// The runtime's signal handler. Forwards `signal` to the host's own
    /// handler first, then relays it into interpreted code if any is
    /// running.
    ///
    /// Only touches atomics and the interpreter's pending-call queue.
    pub fn on_signal(&self, signal: Signal) {
        self.host().forward_signal(signal);

        let context = self.context();
        if context.handler_active.load(Ordering::SeqCst) == 0
            || !self.host().interrupt_pending(signal)
            || !self.interpreter().is_executing()
        {
            trace!("{} not relayed", <&'static str>::from(signal));
            return;
        }

        if context.interrupt_set.swap(true, Ordering::SeqCst) {
            return;
        }

        context.state().set(State::InFailedTransaction);
        self.interpreter().schedule(PendingCall::ServiceInterrupt);
    }

    /// Raises the host's pending interrupt inside interpreted code.
    ///
    /// # Errors
    ///
    /// The pending interrupt as a database exception.
    pub(crate) fn service_pending_interrupt(&self) -> Result<(), Exception> {
        let pending = self.host().check_for_interrupts();
        self.context().interrupt_set.store(false, Ordering::SeqCst);

        pending.map_err(|record| {
            debug!("servicing interrupt: {}", record.message());
            self.host_error_to_exception(record, true)
        })
    }
}
