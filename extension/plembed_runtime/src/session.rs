//! The surface through which interpreted code reaches the runtime.

use std::sync::Arc;

use plembed_diagnostic::ErrorRecord;

use crate::{
    descriptor::TupleDescriptor,
    exception::Exception,
    ist::Transaction,
    procedure::{Procedure, ProcedureId},
    state::Readiness,
};

/// Runtime services for interpreted code.
///
/// Every database-touching operation consults the readiness gate first and
/// refuses to run unless the runtime is ready.
pub trait Session<O> {
    /// The database-ready gate.
    fn readiness(&self) -> Readiness;

    /// Fails with the gate's diagnostic unless the database is ready.
    ///
    /// # Errors
    ///
    /// `RuntimeError` ("database not ready") outside a usable transaction,
    /// the in-failed-transaction database error in a failed one.
    fn ensure_ready(&self) -> Result<(), Exception>;

    /// Opens the nested scope of `transaction`.
    ///
    /// # Errors
    ///
    /// Gate failures, ledger refusals, host failures.
    fn enter(&self, transaction: &mut Transaction) -> Result<(), Exception>;

    /// Closes the nested scope of `transaction`: committing it when
    /// `failed` is `false`, rolling it back otherwise.
    ///
    /// # Errors
    ///
    /// Ledger refusals, host failures, and a commit attempted while the
    /// transaction had failed.
    fn exit(
        &self,
        transaction: &mut Transaction,
        failed: bool,
    ) -> Result<(), Exception>;

    /// Executes a statement.
    ///
    /// # Errors
    ///
    /// Gate failures and host failures.
    fn execute(&self, statement: &str) -> Result<u64, Exception>;

    /// Resolves a procedure by identifier.
    ///
    /// # Errors
    ///
    /// Gate failures, unknown procedures, host failures.
    fn lookup_procedure(
        &self,
        id: ProcedureId,
    ) -> Result<Arc<Procedure>, Exception>;

    /// Arranges a mapping or sequence in the attribute order of
    /// `descriptor`.
    ///
    /// # Errors
    ///
    /// Wrong shape, unknown fields, and objects that are neither.
    fn normalize_row(
        &self,
        descriptor: &TupleDescriptor,
        row: &O,
    ) -> Result<Vec<O>, Exception>;

    /// Drives the state of the stateful procedure `owner`: the first call of
    /// a transaction starts `source`, later calls resume it.
    ///
    /// # Errors
    ///
    /// No execution context, a foreign procedure's context, a source that
    /// does not produce a usable state, and whatever the state raises.
    fn stateful(
        &self,
        owner: ProcedureId,
        source: &O,
        arguments: Vec<O>,
    ) -> Result<O, Exception>;

    /// Turns a host error into an exception, marking the transaction as
    /// failed unless `inhibit` is set.
    fn raise_host_error(&self, record: ErrorRecord, inhibit: bool) -> Exception;

    /// Parks an exception and returns the marker record that lets host
    /// frames unwind without converting it again.
    fn relay(&self, exception: Exception) -> ErrorRecord;

    /// The pending call scheduled by the signal relay.
    ///
    /// # Errors
    ///
    /// The interrupt, if it is still pending.
    fn service_interrupt(&self) -> Result<(), Exception>;
}
