//! The host database as seen by the runtime.

use std::sync::Arc;

use plembed_diagnostic::ErrorRecord;
use plembed_handler::Handler;

use crate::{
    datum::Row,
    descriptor::{TupleDescriptor, TypeDescriptor, TypeId},
    procedure::{Procedure, ProcedureId, Visibility},
    signal::Signal,
};

/// An open host cursor recognized in a procedure's result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cursor {
    /// Portal name.
    pub name: String,

    /// Rows already fetched by interpreted code but not consumed.
    pub buffered: Vec<Row>,

    /// Whether fetches move forward.
    pub forward: bool,
}

/// Services the host database offers the runtime.
///
/// Every fallible operation reports the host's own [`ErrorRecord`];
/// non-fatal reports (warnings, notices) go through the [`Handler`]
/// supertrait.
pub trait Host: Handler<ErrorRecord> {
    /// Opens a nested transaction scope.
    ///
    /// # Errors
    ///
    /// Any host failure.
    fn begin_subtransaction(&self) -> Result<(), ErrorRecord>;

    /// Releases the innermost nested scope, keeping its work.
    ///
    /// # Errors
    ///
    /// Any host failure.
    fn release_subtransaction(&self) -> Result<(), ErrorRecord>;

    /// Rolls back and releases the innermost nested scope.
    ///
    /// # Errors
    ///
    /// Any host failure.
    fn rollback_subtransaction(&self) -> Result<(), ErrorRecord>;

    /// Builds a procedure from its catalog entry, or `None` if no such
    /// procedure exists.
    ///
    /// # Errors
    ///
    /// Any host failure.
    fn load_procedure(
        &self,
        id: ProcedureId,
    ) -> Result<Option<Procedure>, ErrorRecord>;

    /// Returns the current catalog stamp of a procedure.
    fn procedure_visibility(&self, id: ProcedureId) -> Option<Visibility>;

    /// Resolves a type by identifier.
    ///
    /// # Errors
    ///
    /// Unknown types and any host failure.
    fn lookup_type(
        &self,
        id: TypeId,
    ) -> Result<Arc<TypeDescriptor>, ErrorRecord>;

    /// Resolves the array type whose element is `element`.
    ///
    /// # Errors
    ///
    /// The type has no array type, or any host failure.
    fn lookup_array_type(
        &self,
        element: TypeId,
    ) -> Result<Arc<TypeDescriptor>, ErrorRecord>;

    /// Checks that a descriptor still matches its catalog definition.
    fn type_is_current(&self, descriptor: &TypeDescriptor) -> bool;

    /// Forms a host row from positional values.
    ///
    /// # Errors
    ///
    /// Values that do not fit the descriptor.
    fn form_row(
        &self,
        descriptor: &TupleDescriptor,
        values: Vec<crate::datum::Datum>,
    ) -> Result<Row, ErrorRecord>;

    /// Fetches up to `count` rows from a cursor.
    ///
    /// # Errors
    ///
    /// Any host failure.
    fn fetch(
        &self,
        cursor: &Cursor,
        count: usize,
    ) -> Result<Vec<Row>, ErrorRecord>;

    /// Executes a statement and returns the number of processed rows.
    ///
    /// # Errors
    ///
    /// Any host failure.
    fn execute(&self, statement: &str) -> Result<u64, ErrorRecord>;

    /// Raises a pending interrupt as an error.
    ///
    /// # Errors
    ///
    /// The pending cancel or termination request.
    fn check_for_interrupts(&self) -> Result<(), ErrorRecord>;

    /// Returns `true` if the host has flagged `signal` for processing.
    fn interrupt_pending(&self, signal: Signal) -> bool;

    /// Delivers `signal` to the handler the host had installed before the
    /// runtime.
    fn forward_signal(&self, signal: Signal);

    /// Defers interrupt processing until [`Self::resume_interrupts`].
    fn hold_interrupts(&self);

    /// Ends a [`Self::hold_interrupts`] region.
    fn resume_interrupts(&self);

    /// Opens the host's procedural-access session for one dispatcher frame.
    ///
    /// # Errors
    ///
    /// Any host failure.
    fn connect(&self) -> Result<(), ErrorRecord>;

    /// Closes what [`Self::connect`] opened and restores the caller's
    /// resource scope.
    fn finish(&self);
}
