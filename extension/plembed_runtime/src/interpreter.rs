//! The embedded interpreter as seen by the runtime.
//!
//! Every operation that may run interpreted code receives the [`Session`]
//! through which that code reaches back into the runtime.

use std::fmt::Debug;

use crate::{
    datum::Datum,
    descriptor::TypeDescriptor,
    exception::Exception,
    host::Cursor,
    normalize::RowView,
    procedure::Procedure,
    session::Session,
    signal::PendingCall,
    trigger::TriggerData,
};

/// Operations the runtime needs from the embedded interpreter.
pub trait Interpreter {
    /// A reference to an interpreter object.
    type Object: Clone + Debug;

    /// Executes a procedure's body in a fresh module and returns the module.
    ///
    /// # Errors
    ///
    /// Whatever the body raises.
    fn load_module(
        &self,
        session: &dyn Session<Self::Object>,
        procedure: &Procedure,
    ) -> Result<Self::Object, Exception>;

    /// Compiles a procedure's body without executing it.
    ///
    /// # Errors
    ///
    /// The compile error.
    fn compile(
        &self,
        session: &dyn Session<Self::Object>,
        procedure: &Procedure,
    ) -> Result<(), Exception>;

    /// Returns the module whose `main` runs inline code blocks.
    ///
    /// # Errors
    ///
    /// Whatever its creation raises.
    fn inline_executor(
        &self,
        session: &dyn Session<Self::Object>,
    ) -> Result<Self::Object, Exception>;

    /// Looks up an attribute; `Ok(None)` if it does not exist.
    ///
    /// # Errors
    ///
    /// Whatever the lookup raises.
    fn attribute(
        &self,
        object: &Self::Object,
        name: &str,
    ) -> Result<Option<Self::Object>, Exception>;

    /// Calls `callable` with positional arguments.
    ///
    /// # Errors
    ///
    /// Whatever the call raises.
    fn call(
        &self,
        session: &dyn Session<Self::Object>,
        callable: &Self::Object,
        arguments: Vec<Self::Object>,
    ) -> Result<Self::Object, Exception>;

    /// Returns an iterator over `object`.
    ///
    /// # Errors
    ///
    /// `object` is not iterable.
    fn iterate(
        &self,
        session: &dyn Session<Self::Object>,
        object: &Self::Object,
    ) -> Result<Self::Object, Exception>;

    /// Advances an iterator; `Ok(None)` when it is exhausted.
    ///
    /// # Errors
    ///
    /// Whatever the iterator raises.
    fn next(
        &self,
        session: &dyn Session<Self::Object>,
        iterator: &Self::Object,
    ) -> Result<Option<Self::Object>, Exception>;

    /// Returns the `None` object.
    fn none(&self) -> Self::Object;

    /// Returns `true` for the `None` object.
    fn is_none(&self, object: &Self::Object) -> bool;

    /// Returns `true` if both references denote the same object.
    fn is_same(&self, left: &Self::Object, right: &Self::Object) -> bool;

    /// Builds a tuple.
    fn tuple(&self, items: Vec<Self::Object>) -> Self::Object;

    /// Recognizes a native cursor result.
    fn cursor(&self, object: &Self::Object) -> Option<Cursor>;

    /// Presents `object` as a mapping or a sequence for row normalization.
    ///
    /// # Errors
    ///
    /// `object` is neither.
    fn row_view(
        &self,
        object: &Self::Object,
    ) -> Result<RowView<Self::Object>, Exception>;

    /// Converts a host value of type `ty` into an object.
    ///
    /// # Errors
    ///
    /// Whatever the type's conversion raises.
    fn to_object(
        &self,
        session: &dyn Session<Self::Object>,
        datum: &Datum,
        ty: &TypeDescriptor,
    ) -> Result<Self::Object, Exception>;

    /// Converts an object into a host value of type `ty`.
    ///
    /// # Errors
    ///
    /// Whatever the type's conversion raises.
    fn to_datum(
        &self,
        session: &dyn Session<Self::Object>,
        object: &Self::Object,
        ty: &TypeDescriptor,
    ) -> Result<Datum, Exception>;

    /// Wraps a trigger definition for a trigger handler. The definition
    /// carries no rows; they are passed to the handler separately.
    ///
    /// # Errors
    ///
    /// Whatever the wrapper's construction raises.
    fn trigger_data(
        &self,
        session: &dyn Session<Self::Object>,
        trigger: &TriggerData,
    ) -> Result<Self::Object, Exception>;

    /// Formats an exception with its traceback.
    ///
    /// # Errors
    ///
    /// Formatting itself raised.
    fn format_exception(
        &self,
        exception: &Exception,
    ) -> Result<String, Exception>;

    /// Returns `true` while interpreted code is on the stack.
    fn is_executing(&self) -> bool;

    /// Queues a call for the interpreter's next safe point. Must be callable
    /// from a signal handler.
    fn schedule(&self, call: PendingCall);

    /// Runs queued calls now.
    ///
    /// # Errors
    ///
    /// Whatever a queued call raises.
    fn run_pending(
        &self,
        session: &dyn Session<Self::Object>,
    ) -> Result<(), Exception>;

    /// Runs the language module's setup, once per process.
    ///
    /// # Errors
    ///
    /// Whatever setup raises.
    fn on_entry(
        &self,
        session: &dyn Session<Self::Object>,
    ) -> Result<(), Exception>;

    /// Runs the language module's transaction-end hook.
    ///
    /// # Errors
    ///
    /// Whatever the hook raises.
    fn on_transaction_exit(
        &self,
        session: &dyn Session<Self::Object>,
    ) -> Result<(), Exception>;

    /// Collects unreachable objects.
    ///
    /// # Errors
    ///
    /// Whatever a finalizer raises.
    fn collect_garbage(&self) -> Result<(), Exception>;

    /// Runs the language module's process-exit hook.
    ///
    /// # Errors
    ///
    /// Whatever the hook raises.
    fn on_exit(
        &self,
        session: &dyn Session<Self::Object>,
    ) -> Result<(), Exception>;
}
