//! The runtime: host, interpreter and the process-wide execution state.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use getset::Getters;
use log::trace;
use parking_lot::Mutex;
use plembed_diagnostic::{ErrorRecord, SqlState};

use crate::{
    cache::{CallCache, ContinuationSlot, PolymorphCache, Registry, Resolved},
    config::Config,
    descriptor::TupleDescriptor,
    epoch::EpochCounter,
    exception::Exception,
    host::Host,
    interpreter::Interpreter,
    ist::{HandleState, Ledger, LedgerError, Transaction},
    live::LiveObjects,
    normalize::normalize,
    procedure::{Procedure, ProcedureId},
    session::Session,
    state::{Readiness, StateCell},
};

/// One dispatcher invocation on the stack.
#[derive(Debug)]
pub struct Frame<O> {
    pub(crate) procedure: Option<ProcedureId>,
    pub(crate) filename: Option<String>,
    pub(crate) description: Option<&'static str>,
    pub(crate) continuation: Option<ContinuationSlot<O>>,
}

impl<O> Frame<O> {
    const fn new() -> Self {
        Self {
            procedure: None,
            filename: None,
            description: None,
            continuation: None,
        }
    }
}

/// Process-wide mutable state shared by every dispatcher frame.
#[derive(Debug, Getters)]
pub struct RuntimeContext<O> {
    /// The runtime state machine.
    #[get = "pub"]
    state: StateCell,

    /// The transaction epoch.
    #[get = "pub"]
    epoch: EpochCounter,

    /// The internal subtransaction ledger.
    #[get = "pub"]
    ledger: Ledger,

    pub(crate) live: Mutex<LiveObjects<O>>,
    pub(crate) registry: Mutex<Registry<O>>,
    pub(crate) polymorph: Mutex<PolymorphCache>,
    pub(crate) frames: Mutex<Vec<Frame<O>>>,
    pub(crate) relayed: Mutex<Option<Exception>>,
    pub(crate) inline: Mutex<Option<CallCache<O>>>,
    pub(crate) handler_active: AtomicUsize,
    pub(crate) entered: AtomicBool,
    pub(crate) interrupt_set: AtomicBool,
    pub(crate) raising_interrupt: AtomicBool,
}

impl<O> RuntimeContext<O> {
    fn new(config: &Config) -> Self {
        Self {
            state: StateCell::new(),
            epoch: EpochCounter::default(),
            ledger: Ledger::new(config.subtransaction_limit),
            live: Mutex::new(LiveObjects::default()),
            registry: Mutex::new(Registry::default()),
            polymorph: Mutex::new(PolymorphCache::new(
                config.polymorph_cache_capacity,
            )),
            frames: Mutex::new(Vec::new()),
            relayed: Mutex::new(None),
            inline: Mutex::new(None),
            handler_active: AtomicUsize::new(0),
            entered: AtomicBool::new(false),
            interrupt_set: AtomicBool::new(false),
            raising_interrupt: AtomicBool::new(false),
        }
    }

    /// Returns the number of dispatcher frames currently executing.
    #[must_use]
    pub fn handler_active(&self) -> usize {
        self.handler_active.load(Ordering::SeqCst)
    }

    /// Returns the number of objects in the live-objects set.
    #[must_use]
    pub fn live_count(&self) -> usize { self.live.lock().len() }

    /// Returns `true` if a relay from the signal handler is pending.
    #[must_use]
    pub fn interrupt_set(&self) -> bool {
        self.interrupt_set.load(Ordering::SeqCst)
    }
}

/// The execution-state and transaction-lifecycle engine of the embedded
/// language.
#[derive(Debug, Getters)]
#[get = "pub"]
pub struct Runtime<H, I: Interpreter> {
    /// The host database.
    host: H,

    /// The embedded interpreter.
    interpreter: I,

    /// Configuration.
    config: Config,

    /// Shared execution state.
    context: RuntimeContext<I::Object>,
}

/// Pops the dispatcher frame pushed by [`Runtime::enter_frame`] on every
/// exit path.
pub(crate) struct FrameGuard<'r, H: Host, I: Interpreter> {
    runtime: &'r Runtime<H, I>,
}

impl<H: Host, I: Interpreter> Drop for FrameGuard<'_, H, I> {
    fn drop(&mut self) {
        let context = &self.runtime.context;

        context.frames.lock().pop();
        context.handler_active.fetch_sub(1, Ordering::SeqCst);
        self.runtime.host.finish();

        trace!("dispatcher frame released");
    }
}

impl<H: Host, I: Interpreter> Runtime<H, I> {
    /// Creates a runtime in the not-initialized state.
    pub fn new(host: H, interpreter: I, config: Config) -> Self {
        let context = RuntimeContext::new(&config);

        Self { host, interpreter, config, context }
    }

    /// Connects to the host and pushes a dispatcher frame.
    pub(crate) fn enter_frame(
        &self,
    ) -> Result<FrameGuard<'_, H, I>, ErrorRecord> {
        self.host.connect()?;

        self.context.frames.lock().push(Frame::new());
        self.context.handler_active.fetch_add(1, Ordering::SeqCst);
        self.context.entered.store(true, Ordering::SeqCst);

        Ok(FrameGuard { runtime: self })
    }

    /// Records what the innermost frame is doing, for error context.
    pub(crate) fn describe(&self, description: &'static str) {
        if let Some(frame) = self.context.frames.lock().last_mut() {
            frame.description = Some(description);
        }
    }

    /// Attaches a resolved procedure to the innermost frame.
    pub(crate) fn bind_frame(&self, resolved: &Resolved<I::Object>) {
        if let Some(frame) = self.context.frames.lock().last_mut() {
            frame.procedure = Some(resolved.procedure.id());
            frame.filename = Some(resolved.procedure.filename());
            frame.continuation = Some(resolved.continuation.clone());
        }
    }

    /// The diagnostic raised by the database-ready gate.
    pub(crate) fn not_ready(readiness: Readiness) -> Exception {
        match readiness {
            Readiness::FailedTransaction => {
                Exception::database(ErrorRecord::error(
                    SqlState::IN_FAILED_SQL_TRANSACTION,
                    "database action attempted while in failed transaction",
                ))
            }
            Readiness::Ready | Readiness::NoTransaction => {
                Exception::runtime("database not ready")
            }
        }
    }

    fn ledger_exception(&self, error: LedgerError) -> Exception {
        match error {
            LedgerError::Host(record) => {
                self.host_error_to_exception(record, false)
            }
            refused => Exception::database(refused.into_record()),
        }
    }

    /// Finds a procedure in the registry or builds it from the catalog,
    /// without executing its module.
    pub(crate) fn find_procedure(
        &self,
        id: ProcedureId,
    ) -> Result<Arc<Procedure>, ErrorRecord> {
        let registered = self.context.registry.lock().get(id);

        if let Some(entry) = registered {
            if entry.procedure.is_current(&self.host) {
                return Ok(entry.procedure);
            }
        }

        self.host
            .load_procedure(id)?
            .map(Arc::new)
            .ok_or_else(|| self.undefined_procedure(id))
    }

    pub(crate) fn undefined_procedure(&self, id: ProcedureId) -> ErrorRecord {
        ErrorRecord::error(
            SqlState::UNDEFINED_FUNCTION,
            format!(
                "could not find {} function with identifier {id}",
                self.config.language
            ),
        )
    }
}

impl<H: Host, I: Interpreter> Session<I::Object> for Runtime<H, I> {
    fn readiness(&self) -> Readiness { self.context.state.readiness() }

    fn ensure_ready(&self) -> Result<(), Exception> {
        match self.readiness() {
            Readiness::Ready => Ok(()),
            readiness => Err(Self::not_ready(readiness)),
        }
    }

    fn enter(&self, transaction: &mut Transaction) -> Result<(), Exception> {
        self.ensure_ready()?;

        let id = self
            .context
            .ledger
            .begin(&self.host, transaction.state())
            .map_err(|error| self.ledger_exception(error))?;
        transaction.opened(id);

        Ok(())
    }

    fn exit(
        &self,
        transaction: &mut Transaction,
        failed: bool,
    ) -> Result<(), Exception> {
        if self.readiness() == Readiness::NoTransaction {
            return Err(Self::not_ready(Readiness::NoTransaction));
        }

        let ledger = &self.context.ledger;
        let state = &self.context.state;
        let (id, declared) = (transaction.id(), transaction.state());

        let (outcome, closed) = if failed {
            let outcome = ledger.abort(&self.host, state, id, declared);
            (outcome, HandleState::Aborted)
        } else {
            let outcome = ledger.commit(&self.host, state, id, declared);
            (outcome, HandleState::Committed)
        };

        match outcome {
            Ok(()) => {
                transaction.close(closed);
                Ok(())
            }
            Err(error) => {
                if matches!(
                    error,
                    LedgerError::CommitRedirected { .. } | LedgerError::Host(_)
                ) {
                    transaction.close(HandleState::Aborted);
                }

                Err(self.ledger_exception(error))
            }
        }
    }

    fn execute(&self, statement: &str) -> Result<u64, Exception> {
        self.ensure_ready()?;

        self.host
            .execute(statement)
            .map_err(|record| self.host_error_to_exception(record, false))
    }

    fn lookup_procedure(
        &self,
        id: ProcedureId,
    ) -> Result<Arc<Procedure>, Exception> {
        self.ensure_ready()?;

        self.find_procedure(id)
            .map_err(|record| self.host_error_to_exception(record, false))
    }

    fn normalize_row(
        &self,
        descriptor: &TupleDescriptor,
        row: &I::Object,
    ) -> Result<Vec<I::Object>, Exception> {
        let view = self.interpreter.row_view(row)?;

        normalize(descriptor, view, || self.interpreter.none())
            .map_err(Exception::from)
    }

    fn stateful(
        &self,
        owner: ProcedureId,
        source: &I::Object,
        arguments: Vec<I::Object>,
    ) -> Result<I::Object, Exception> {
        self.drive_state(owner, source, arguments)
    }

    fn raise_host_error(
        &self,
        record: ErrorRecord,
        inhibit: bool,
    ) -> Exception {
        self.host_error_to_exception(record, inhibit)
    }

    fn relay(&self, exception: Exception) -> ErrorRecord {
        self.relay_exception(exception)
    }

    fn service_interrupt(&self) -> Result<(), Exception> {
        self.service_pending_interrupt()
    }
}
