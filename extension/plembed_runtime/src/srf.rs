//! Set-returning calls: materialization and value-per-call.

use std::sync::Arc;

use log::debug;
use plembed_diagnostic::{ErrorRecord, SqlState};

use crate::{
    cache::{CallCache, Resolved},
    call::{CallInfo, CallKind, Outcome, ResultBuffer, ReturnSetInfo},
    datum::{Datum, Row},
    descriptor::{PseudoType, TupleDescriptor},
    host::{Cursor, Host},
    interpreter::Interpreter,
    live::{Anchor, LiveObject},
    runtime::Runtime,
};

const NORMALIZE_FAILED: &str = "could not normalize result row";

impl<H: Host, I: Interpreter> Runtime<H, I> {
    /// The row shape of each element of the set, `None` for scalar sets.
    fn result_shape(
        resolved: &Resolved<I::Object>,
        info: &ReturnSetInfo,
    ) -> Result<Option<Arc<TupleDescriptor>>, ErrorRecord> {
        if resolved.output.as_pseudo() == Some(PseudoType::Record) {
            return info.expected().clone().map(Some).ok_or_else(|| {
                ErrorRecord::error(
                    SqlState::FEATURE_NOT_SUPPORTED,
                    "cannot execute ambiguous set returning functions",
                )
                .with_hint(
                    "Declare the function's result type or call it with a \
                     column definition list.",
                )
            });
        }

        Ok(resolved.output.tuple().cloned())
    }

    fn element_row(
        &self,
        resolved: &Resolved<I::Object>,
        shape: Option<&TupleDescriptor>,
        element: &I::Object,
    ) -> Result<Row, ErrorRecord> {
        match shape {
            Some(tuple) => self.form_row(tuple, element, NORMALIZE_FAILED),
            None => {
                let datum = self.result_datum(&resolved.output, element)?;
                Ok(Row::new(vec![datum]))
            }
        }
    }

    fn element_datum(
        &self,
        resolved: &Resolved<I::Object>,
        shape: Option<&TupleDescriptor>,
        element: &I::Object,
    ) -> Result<Datum, ErrorRecord> {
        match shape {
            Some(tuple) => {
                self.form_row(tuple, element, NORMALIZE_FAILED).map(Datum::Row)
            }
            None => self.result_datum(&resolved.output, element),
        }
    }

    /// Runs a procedure to completion and buffers its whole result.
    pub(crate) fn materialize(
        &self,
        resolved: &Resolved<I::Object>,
        arguments: &[Datum],
        info: &ReturnSetInfo,
    ) -> Result<ResultBuffer, ErrorRecord> {
        let shape = Self::result_shape(resolved, info)?;
        let arguments = self.arguments(resolved, arguments)?;
        let result = self.invoke_main(resolved, arguments)?;

        let mut buffer =
            ResultBuffer { descriptor: shape.clone(), rows: Vec::new() };

        if !resolved.procedure.returns_set() {
            let row = self.element_row(resolved, shape.as_deref(), &result)?;
            buffer.rows.push(row);
            return Ok(buffer);
        }

        if let Some(cursor) = self.interpreter().cursor(&result) {
            buffer.rows = self.drain_cursor(cursor)?;
            return Ok(buffer);
        }

        self.describe("materializing");
        let iterator = self.iterate(&result)?;

        loop {
            let element =
                self.interpreter().next(self, &iterator).map_err(|exception| {
                    self.exception_to_host_error(
                        exception,
                        SqlState::INTERPRETER_EXCEPTION,
                        "iteration for materialized set raised an exception",
                    )
                })?;

            let Some(element) = element else { break };
            let row = self.element_row(resolved, shape.as_deref(), &element)?;
            buffer.rows.push(row);
        }

        debug!("materialized {} rows", buffer.rows.len());
        Ok(buffer)
    }

    fn iterate(&self, result: &I::Object) -> Result<I::Object, ErrorRecord> {
        self.interpreter().iterate(self, result).map_err(|exception| {
            self.exception_to_host_error(
                exception,
                SqlState::INTERPRETER_ERROR,
                "could not get iterator from result",
            )
        })
    }

    fn drain_cursor(
        &self,
        mut cursor: Cursor,
    ) -> Result<Vec<Row>, ErrorRecord> {
        let mut rows = std::mem::take(&mut cursor.buffered);
        let chunk = self.config().cursor_fetch_size;

        loop {
            let fetched = self.host().fetch(&cursor, chunk)?;
            if fetched.is_empty() {
                break;
            }

            rows.extend(fetched);
        }

        Ok(rows)
    }

    /// Produces the next value of a value-per-call set, starting the
    /// iteration on the first call.
    pub(crate) fn value_per_call(
        &self,
        resolved: &Resolved<I::Object>,
        arguments: &[Datum],
        info: &mut ReturnSetInfo,
        cache: &mut Option<CallCache<I::Object>>,
    ) -> Result<Outcome<I::Object>, ErrorRecord> {
        let Some(cache) = cache.as_mut() else {
            return Err(ErrorRecord::error(
                SqlState::INTERNAL_ERROR,
                "value-per-call without call cache",
            ));
        };

        let shape = Self::result_shape(resolved, info)?;
        let iterator = match self.continuation(cache) {
            Some(iterator) => iterator,
            None => {
                let arguments = self.arguments(resolved, arguments)?;
                let result = self.invoke_main(resolved, arguments)?;

                let iterator = self.iterate(&result)?;

                let key = self
                    .context()
                    .live
                    .lock()
                    .register(LiveObject::Continuation(iterator.clone()));
                cache.set_internal(Some(Anchor::Live(key)));
                info.set_cleanup_registered(true);

                iterator
            }
        };

        self.describe("getting the next value");
        match self.interpreter().next(self, &iterator) {
            Ok(Some(element)) => {
                let datum =
                    self.element_datum(resolved, shape.as_deref(), &element);
                if datum.is_err() {
                    self.dispose(cache, info);
                }

                datum.map(Outcome::Next)
            }
            Ok(None) => {
                self.dispose(cache, info);
                Ok(Outcome::Done)
            }
            Err(exception) => {
                self.dispose(cache, info);

                Err(self.exception_to_host_error(
                    exception,
                    SqlState::INTERPRETER_EXCEPTION,
                    "iteration for value-per-call set raised an exception",
                ))
            }
        }
    }

    fn continuation(
        &self,
        cache: &CallCache<I::Object>,
    ) -> Option<I::Object> {
        let anchor = cache.internal().as_ref()?;

        self.context().live.lock().resolve(anchor)?.into_continuation().ok()
    }

    fn dispose(
        &self,
        cache: &mut CallCache<I::Object>,
        info: &mut ReturnSetInfo,
    ) {
        if let Some(Anchor::Live(key)) = cache.internal().clone() {
            self.context().live.lock().discard(key);
        }

        cache.set_internal(None);
        info.set_cleanup_registered(false);
    }

    /// Releases the iteration of a value-per-call set the caller stopped
    /// pulling from before its end.
    pub fn shutdown(&self, call: &mut CallInfo<I::Object>) {
        let CallInfo { kind, cache, .. } = call;

        if let (CallKind::SetReturning(info), Some(cache)) =
            (kind, cache.as_mut())
        {
            if info.cleanup_registered() {
                debug!("shutting down value-per-call set");
                self.dispose(cache, info);
            }
        }
    }
}

#[cfg(test)]
mod tests;
