//! Stateful procedures: a generator started once per call handle and fed
//! each subsequent call's arguments through its `send` method.

use log::debug;

use crate::{
    exception::{Exception, ExceptionKind},
    host::Host,
    interpreter::Interpreter,
    live::{Anchor, LiveObject},
    procedure::ProcedureId,
    runtime::Runtime,
};

impl<H: Host, I: Interpreter> Runtime<H, I> {
    /// Produces the next result of the state owned by the innermost frame's
    /// call handle, starting a new state from `source` if there is none or
    /// the previous one is exhausted.
    pub(crate) fn drive_state(
        &self,
        owner: ProcedureId,
        source: &I::Object,
        arguments: Vec<I::Object>,
    ) -> Result<I::Object, Exception> {
        let (procedure, slot) = self
            .context()
            .frames
            .lock()
            .last()
            .and_then(|frame| {
                Some((frame.procedure?, frame.continuation.clone()?))
            })
            .ok_or_else(|| {
                Exception::runtime(
                    "cannot call Stateful without execution context",
                )
            })?;

        if procedure != owner {
            return Err(Exception::runtime(
                "cannot call Stateful across execution contexts",
            ));
        }

        let anchor = slot.lock().clone();
        let current = anchor
            .and_then(|anchor| self.context().live.lock().resolve(&anchor));

        if let Some(LiveObject::State(send)) = current {
            let packed = self.interpreter().tuple(arguments.clone());

            match self.interpreter().call(self, &send, vec![packed]) {
                Ok(result) => return Ok(result),
                Err(exception)
                    if exception.is(&ExceptionKind::StopIteration) =>
                {
                    debug!(
                        "state of procedure {owner} exhausted; restarting"
                    );

                    if let Some(Anchor::Live(key)) = slot.lock().take() {
                        self.context().live.lock().discard(key);
                    }
                }
                Err(exception) => return Err(exception),
            }
        }

        let state = self.interpreter().call(self, source, arguments)?;
        let iterator = self
            .interpreter()
            .iterate(self, &state)
            .map_err(|_| {
                Exception::type_error(
                    "state source did not return an iterator",
                )
            })?;

        let first = self
            .interpreter()
            .next(self, &iterator)?
            .ok_or_else(|| Exception::runtime("empty state object"))?;

        let send = self
            .interpreter()
            .attribute(&iterator, "send")?
            .ok_or_else(|| {
                Exception::type_error(
                    "stateful source did not produce an object with a 'send' \
                     method",
                )
            })?;

        let key = self.context().live.lock().register(LiveObject::State(send));
        *slot.lock() = Some(Anchor::Live(key));

        Ok(first)
    }
}
