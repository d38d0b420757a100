//! The entry-point dispatcher.
//!
//! Every host invocation of interpreted code goes through
//! [`Runtime::handle`]. It pushes a frame, resolves the call cache, runs the
//! procedure in the requested mode and, on the way out, verifies that the
//! procedure closed every subtransaction it opened and did not swallow a
//! database error.

use std::sync::Arc;

use log::debug;
use plembed_diagnostic::{ErrorRecord, Severity, SqlState};

use crate::{
    cache::{anchor_entry, CallCache, RegistryEntry, Resolved},
    call::{AllowedModes, CallInfo, CallKind, Outcome},
    datum::{Datum, Row},
    descriptor::{
        Attribute, PseudoType, TupleDescriptor, TypeDescriptor, TypeId,
    },
    exception::Exception,
    host::Host,
    interpreter::Interpreter,
    live::LiveObject,
    procedure::{Procedure, ProcedureId},
    runtime::Runtime,
    session::Session,
    state::State,
};

/// Parameter shape, result type and the newly specialized descriptors of
/// one call site.
type Specialization<O> =
    (Arc<TupleDescriptor>, Arc<TypeDescriptor>, Vec<LiveObject<O>>);

impl<H: Host, I: Interpreter> Runtime<H, I> {
    /// Invokes interpreted code on behalf of the host.
    ///
    /// # Errors
    ///
    /// Every failure surfaces as a host [`ErrorRecord`]: host errors pass
    /// through, exceptions are converted with their traceback as context,
    /// and broken invariants raise protocol violations.
    pub fn handle(
        &self,
        call: &mut CallInfo<I::Object>,
    ) -> Result<Outcome<I::Object>, ErrorRecord> {
        self.initialize()?;

        let _frame = self.enter_frame()?;
        let baseline = self.context().ledger().open_count();

        match self.dispatch(call) {
            Ok(outcome) => {
                self.check_state(baseline)?;
                Ok(outcome)
            }
            Err(record) => Err(self.recover(record, baseline)),
        }
    }

    fn dispatch(
        &self,
        call: &mut CallInfo<I::Object>,
    ) -> Result<Outcome<I::Object>, ErrorRecord> {
        let CallInfo {
            procedure,
            arguments,
            argument_types,
            return_type,
            kind,
            cache,
        } = call;

        let resolved =
            self.resolve(*procedure, argument_types, *return_type, cache)?;
        self.bind_frame(&resolved);

        match kind {
            CallKind::Preload => Ok(Outcome::Module(resolved.module)),
            CallKind::Trigger(trigger) => {
                self.fire(&resolved, cache, trigger).map(Outcome::Trigger)
            }
            CallKind::SetReturning(info) => {
                if info.prefers_materialize() {
                    self.materialize(&resolved, arguments, info)
                        .map(Outcome::Materialized)
                } else if !info
                    .allowed()
                    .contains(AllowedModes::VALUE_PER_CALL)
                {
                    Err(ErrorRecord::error(
                        SqlState::FEATURE_NOT_SUPPORTED,
                        "unsupported set-returning mode requested",
                    ))
                } else if resolved.procedure.returns_set() {
                    self.value_per_call(&resolved, arguments, info, cache)
                } else {
                    self.plain(&resolved, arguments).map(Outcome::Value)
                }
            }
            CallKind::Plain => {
                if resolved.procedure.returns_set() {
                    return Err(ErrorRecord::error(
                        SqlState::FEATURE_NOT_SUPPORTED,
                        "set-valued function called in context that cannot \
                         accept a set",
                    ));
                }

                self.plain(&resolved, arguments).map(Outcome::Value)
            }
        }
    }

    /// The error path: absolve the failure the error already reports, force
    /// open subtransactions closed, and unwrap a relay.
    fn recover(&self, record: ErrorRecord, baseline: u64) -> ErrorRecord {
        self.context()
            .state()
            .transition(State::InFailedTransaction, State::Ready);
        self.report_state(baseline);

        if record.is_relay() {
            let exception = self.take_relayed();
            let message = format!(
                "function raised a {} exception",
                self.config().language
            );

            self.exception_to_host_error(
                exception,
                SqlState::INTERPRETER_EXCEPTION,
                &message,
            )
        } else {
            record
        }
    }

    /// Verifies the ledger and the runtime state after interpreted code
    /// returned normally.
    ///
    /// # Errors
    ///
    /// A protocol violation if subtransactions were left open or a database
    /// error was swallowed.
    pub(crate) fn check_state(&self, baseline: u64) -> Result<(), ErrorRecord> {
        if let Some(violation) =
            self.unwind_subtransactions(baseline, Severity::Error)
        {
            return Err(violation);
        }

        if self
            .context()
            .state()
            .transition(State::InFailedTransaction, State::Ready)
        {
            return Err(failed_to_propagate().with_hint(
                "A subtransaction can be used to recover from database errors.",
            ));
        }

        Ok(())
    }

    /// Like [`Self::check_state`] on a path that is already failing: the
    /// violation is reported as a warning and nothing is raised.
    pub(crate) fn report_state(&self, baseline: u64) {
        if let Some(violation) =
            self.unwind_subtransactions(baseline, Severity::Warning)
        {
            self.host().receive(violation);
        }
    }

    fn unwind_subtransactions(
        &self,
        baseline: u64,
        severity: Severity,
    ) -> Option<ErrorRecord> {
        let ledger = self.context().ledger();
        let remaining = ledger
            .open_count()
            .checked_sub(baseline)
            .filter(|n| *n > 0)?;

        ledger.reset(self.host(), remaining);
        ledger.restore(baseline);

        if self
            .context()
            .state()
            .transition(State::InFailedTransaction, State::Ready)
        {
            self.host().receive(
                failed_to_propagate().with_severity(Severity::Warning),
            );
        }

        Some(
            ErrorRecord::new(
                severity,
                SqlState::PROTOCOL_VIOLATION,
                "function failed to exit all subtransactions",
            )
            .with_detail(format!(
                "The {remaining} remaining subtransactions have been aborted."
            )),
        )
    }

    /// Produces a current cache for the call, reusing the existing one when
    /// its stamp admits the current epoch.
    pub(crate) fn resolve(
        &self,
        id: ProcedureId,
        argument_types: &[TypeId],
        return_type: Option<TypeId>,
        cache: &mut Option<CallCache<I::Object>>,
    ) -> Result<Resolved<I::Object>, ErrorRecord> {
        let epoch = self.context().epoch().current();

        if let Some(existing) = cache.as_ref() {
            let live = self.context().live.lock();

            if existing.is_fresh(epoch, &live) {
                if let Some(resolved) = existing.resolve(&live) {
                    return Ok(resolved);
                }
            }
        }

        debug!(
            "resolving call cache of procedure {id} in epoch {}",
            epoch.get()
        );
        self.describe("loading function module");

        let entry = self.load_entry(id)?;
        let (input, output, specialized) =
            self.specialize(&entry.procedure, argument_types, return_type)?;

        let mut live = self.context().live.lock();
        let (procedure_anchor, module_anchor) = anchor_entry(&mut live, &entry);
        let keys = specialized
            .into_iter()
            .map(|object| live.register(object))
            .collect();
        drop(live);

        let fresh = CallCache::new(
            epoch,
            procedure_anchor,
            module_anchor,
            input.clone(),
            output.clone(),
        )
        .with_specialized(keys);
        let continuation = fresh.continuation().clone();
        *cache = Some(fresh);

        Ok(Resolved {
            procedure: entry.procedure,
            module: entry.module,
            input,
            output,
            continuation,
        })
    }

    /// Returns the registry entry of `id`, loading it when absent or no
    /// longer current.
    fn load_entry(
        &self,
        id: ProcedureId,
    ) -> Result<RegistryEntry<I::Object>, ErrorRecord> {
        let registered = self.context().registry.lock().get(id);

        if let Some(entry) = registered {
            if entry.procedure.is_current(self.host()) {
                return Ok(entry);
            }

            debug!("procedure {id} was superseded; reloading");
            self.context().registry.lock().remove(id);
        }

        let procedure = self
            .host()
            .load_procedure(id)?
            .map(Arc::new)
            .ok_or_else(|| self.undefined_procedure(id))?;
        let module = self.load_module(&procedure)?;

        let entry = RegistryEntry { procedure, module };
        self.context().registry.lock().insert(entry.clone());

        Ok(entry)
    }

    fn load_module(
        &self,
        procedure: &Procedure,
    ) -> Result<I::Object, ErrorRecord> {
        let baseline = self.context().ledger().open_count();

        match self.interpreter().load_module(self, procedure) {
            Ok(module) => {
                self.check_state(baseline)?;
                Ok(module)
            }
            Err(exception) => {
                self.report_state(baseline);

                Err(self.exception_to_host_error(
                    exception,
                    SqlState::INTERPRETER_ERROR,
                    &format!(
                        "could not load {} function's module object",
                        self.config().language
                    ),
                ))
            }
        }
    }

    /// Substitutes the generic parameter and result types of `procedure`.
    /// Returns the descriptors to use and the newly created ones, which the
    /// caller registers as live objects.
    fn specialize(
        &self,
        procedure: &Procedure,
        argument_types: &[TypeId],
        return_type: Option<TypeId>,
    ) -> Result<Specialization<I::Object>, ErrorRecord> {
        if !procedure.is_polymorphic() {
            return Ok((
                procedure.input().clone(),
                procedure.output().clone(),
                Vec::new(),
            ));
        }

        let target =
            self.polymorph_target(procedure, argument_types, return_type)?;
        let mut created = Vec::new();

        let input = if procedure.input().first_polymorphic().is_some() {
            let attributes = procedure
                .input()
                .attributes()
                .iter()
                .map(|attribute| {
                    if attribute.ty().is_polymorphic() {
                        self.specialized(attribute.ty(), &target, &mut created)
                            .map(|ty| {
                                Attribute::new(attribute.name().clone(), ty)
                            })
                    } else {
                        Ok(attribute.clone())
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;

            let tuple = Arc::new(TupleDescriptor::new(attributes));
            created.push(LiveObject::TupleDescriptor(tuple.clone()));
            tuple
        } else {
            procedure.input().clone()
        };

        let output = if procedure.output().is_polymorphic() {
            self.specialized(procedure.output(), &target, &mut created)?
        } else {
            procedure.output().clone()
        };

        Ok((input, output, created))
    }

    /// The concrete element type generic placeholders stand for at this call
    /// site: the first generic argument's actual type, else the actual
    /// result type; arrays contribute their element type.
    fn polymorph_target(
        &self,
        procedure: &Procedure,
        argument_types: &[TypeId],
        return_type: Option<TypeId>,
    ) -> Result<Arc<TypeDescriptor>, ErrorRecord> {
        let unresolved = || {
            ErrorRecord::error(
                SqlState::PROTOCOL_VIOLATION,
                "could not resolve polymorphic target type",
            )
            .with_detail(format!(
                "Function {} has generic parameters or result.",
                procedure.filename()
            ))
        };

        let id = match procedure.input().first_polymorphic() {
            Some(position) => argument_types.get(position).copied(),
            None => return_type,
        }
        .ok_or_else(unresolved)?;

        let actual = self.host().lookup_type(id)?;
        if actual.is_polymorphic() {
            return Err(unresolved());
        }

        let element = actual.element().cloned();
        Ok(element.unwrap_or(actual))
    }

    fn specialized(
        &self,
        generic: &TypeDescriptor,
        target: &Arc<TypeDescriptor>,
        created: &mut Vec<LiveObject<I::Object>>,
    ) -> Result<Arc<TypeDescriptor>, ErrorRecord> {
        let pseudo = generic.as_pseudo().unwrap_or(PseudoType::AnyElement);
        let cached = self.context().polymorph.lock().get(pseudo, target.id());

        if let Some(descriptor) = cached {
            if self.host().type_is_current(&descriptor) {
                return Ok(descriptor);
            }

            self.context().polymorph.lock().evict(pseudo, target.id());
        }

        let descriptor = match pseudo {
            PseudoType::AnyArray => {
                self.host().lookup_array_type(target.id())?
            }
            _ => target.clone(),
        };

        self.context().polymorph.lock().insert(
            pseudo,
            target.id(),
            descriptor.clone(),
        );
        created.push(LiveObject::Descriptor(descriptor.clone()));

        Ok(descriptor)
    }

    /// Converts call arguments to objects.
    pub(crate) fn arguments(
        &self,
        resolved: &Resolved<I::Object>,
        arguments: &[Datum],
    ) -> Result<Vec<I::Object>, ErrorRecord> {
        self.describe("building arguments");

        resolved
            .input
            .attributes()
            .iter()
            .zip(arguments)
            .map(|(attribute, datum)| {
                if datum.is_null() {
                    return Ok(self.interpreter().none());
                }

                self.interpreter()
                    .to_object(self, datum, attribute.ty())
                    .map_err(|exception| {
                        self.exception_to_host_error(
                            exception,
                            SqlState::INTERPRETER_ERROR,
                            "could not create argument object",
                        )
                    })
            })
            .collect()
    }

    /// Calls the module's `main`, through the state machinery for stateful
    /// procedures.
    pub(crate) fn invoke_main(
        &self,
        resolved: &Resolved<I::Object>,
        arguments: Vec<I::Object>,
    ) -> Result<I::Object, ErrorRecord> {
        self.describe("executing main");

        let main = self
            .interpreter()
            .attribute(&resolved.module, "main")
            .map_err(|exception| {
                self.exception_to_host_error(
                    exception,
                    SqlState::INTERPRETER_ERROR,
                    "could not get \"main\"",
                )
            })?
            .ok_or_else(|| {
                ErrorRecord::error(
                    SqlState::PROTOCOL_VIOLATION,
                    "function module has no \"main\" object",
                )
            })?;

        let result = if resolved.procedure.stateful() {
            self.drive_state(resolved.procedure.id(), &main, arguments)
        } else {
            self.interpreter().call(self, &main, arguments)
        };

        result.map_err(|exception| {
            let message = format!(
                "function's \"main\" raised a {} exception",
                self.config().language
            );

            self.exception_to_host_error(
                exception,
                SqlState::INTERPRETER_EXCEPTION,
                &message,
            )
        })
    }

    fn plain(
        &self,
        resolved: &Resolved<I::Object>,
        arguments: &[Datum],
    ) -> Result<Datum, ErrorRecord> {
        let arguments = self.arguments(resolved, arguments)?;
        let result = self.invoke_main(resolved, arguments)?;

        self.result_datum(&resolved.output, &result)
    }

    /// Converts a returned object to a value of type `output`.
    pub(crate) fn result_datum(
        &self,
        output: &TypeDescriptor,
        object: &I::Object,
    ) -> Result<Datum, ErrorRecord> {
        self.describe("creating result");

        if output.is_void() || self.interpreter().is_none(object) {
            return Ok(Datum::Null);
        }

        if let Some(tuple) = output.tuple() {
            return self
                .form_row(tuple, object, "could not normalize returned row")
                .map(Datum::Row);
        }

        self.interpreter().to_datum(self, object, output).map_err(|exception| {
            self.exception_to_host_error(
                exception,
                SqlState::INTERPRETER_ERROR,
                "could not create result from returned object",
            )
        })
    }

    /// Normalizes `object` against `tuple` and forms a host row.
    pub(crate) fn form_row(
        &self,
        tuple: &TupleDescriptor,
        object: &I::Object,
        message: &str,
    ) -> Result<Row, ErrorRecord> {
        let converted = self.normalize_row(tuple, object).and_then(|values| {
            tuple
                .attributes()
                .iter()
                .zip(values)
                .map(|(attribute, value)| {
                    if self.interpreter().is_none(&value) {
                        Ok(Datum::Null)
                    } else {
                        self.interpreter()
                            .to_datum(self, &value, attribute.ty())
                    }
                })
                .collect::<Result<Vec<_>, Exception>>()
        });

        let values = converted.map_err(|exception| {
            self.exception_to_host_error(
                exception,
                SqlState::INTERPRETER_ERROR,
                message,
            )
        })?;

        self.host().form_row(tuple, values)
    }
}

fn failed_to_propagate() -> ErrorRecord {
    ErrorRecord::error(
        SqlState::PROTOCOL_VIOLATION,
        "function failed to propagate error state",
    )
}
