//! Invocation handles passed in by the host.

use std::sync::Arc;

use bitflags::bitflags;
use getset::{CopyGetters, Getters, MutGetters};

use crate::{
    cache::CallCache,
    datum::{Datum, Row},
    descriptor::{TupleDescriptor, TypeId},
    procedure::ProcedureId,
    trigger::{TriggerData, TriggerOutcome},
};

bitflags! {
    /// Result-set modes the caller of a set-returning procedure accepts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AllowedModes: u8 {
        /// One value per call.
        const VALUE_PER_CALL = 1;
        /// The whole result in a buffer.
        const MATERIALIZE = 1 << 1;
        /// A buffer that supports random access.
        const MATERIALIZE_RANDOM = 1 << 2;
        /// The caller prefers a buffer when both modes are allowed.
        const MATERIALIZE_PREFERRED = 1 << 3;
    }
}

/// The caller's side of a set-returning call.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct ReturnSetInfo {
    /// Accepted result modes.
    #[get_copy = "pub"]
    allowed: AllowedModes,

    /// The row shape the caller expects, required for record results.
    #[get = "pub"]
    expected: Option<Arc<TupleDescriptor>>,

    /// Whether the caller must invoke [`crate::Runtime::shutdown`] if it
    /// stops pulling values early.
    #[get_copy = "pub"]
    cleanup_registered: bool,
}

impl ReturnSetInfo {
    /// Creates the info for a caller accepting `allowed`.
    #[must_use]
    pub const fn new(
        allowed: AllowedModes,
        expected: Option<Arc<TupleDescriptor>>,
    ) -> Self {
        Self { allowed, expected, cleanup_registered: false }
    }

    pub(crate) fn set_cleanup_registered(&mut self, registered: bool) {
        self.cleanup_registered = registered;
    }

    /// Returns `true` if materialization should be used.
    #[must_use]
    pub const fn prefers_materialize(&self) -> bool {
        self.allowed.contains(AllowedModes::MATERIALIZE)
            && (!self.allowed.contains(AllowedModes::VALUE_PER_CALL)
                || self.allowed.contains(AllowedModes::MATERIALIZE_PREFERRED))
    }
}

/// The way a procedure is being called.
#[derive(Debug, Clone, PartialEq)]
pub enum CallKind {
    /// An ordinary call producing one value.
    Plain,

    /// A trigger firing.
    Trigger(TriggerData),

    /// A call from a context accepting a set.
    SetReturning(ReturnSetInfo),

    /// Resolve the procedure and return its module only.
    Preload,
}

/// One invocation handle. The host keeps it across calls from the same call
/// site; the runtime keeps its cache in [`Self::cache`].
#[derive(Debug, Getters, MutGetters, CopyGetters)]
pub struct CallInfo<O> {
    /// The procedure being called.
    #[get_copy = "pub"]
    pub(crate) procedure: ProcedureId,

    /// Argument values.
    #[getset(get = "pub", get_mut = "pub")]
    pub(crate) arguments: Vec<Datum>,

    /// Actual argument types at this call site.
    #[get = "pub"]
    pub(crate) argument_types: Vec<TypeId>,

    /// Actual result type at this call site.
    #[get_copy = "pub"]
    pub(crate) return_type: Option<TypeId>,

    /// How the procedure is called.
    #[getset(get = "pub", get_mut = "pub")]
    pub(crate) kind: CallKind,

    /// The per-call info cache.
    #[getset(get = "pub", get_mut = "pub")]
    pub(crate) cache: Option<CallCache<O>>,
}

impl<O> CallInfo<O> {
    /// Creates a handle with no cache.
    #[must_use]
    pub const fn new(procedure: ProcedureId, kind: CallKind) -> Self {
        Self {
            procedure,
            arguments: Vec::new(),
            argument_types: Vec::new(),
            return_type: None,
            kind,
            cache: None,
        }
    }

    /// Sets the arguments and their actual types.
    #[must_use]
    pub fn with_arguments(mut self, arguments: Vec<(Datum, TypeId)>) -> Self {
        (self.arguments, self.argument_types) = arguments.into_iter().unzip();
        self
    }

    /// Sets the actual result type.
    #[must_use]
    pub fn with_return_type(mut self, return_type: TypeId) -> Self {
        self.return_type = Some(return_type);
        self
    }

    /// Replaces the arguments for the next call from the same site.
    pub fn rebind(&mut self, arguments: Vec<Datum>) {
        self.arguments = arguments;
    }
}

/// A fully drained set result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultBuffer {
    /// Row shape, or `None` for a single unnamed scalar column.
    pub descriptor: Option<Arc<TupleDescriptor>>,

    /// The rows in production order.
    pub rows: Vec<Row>,
}

/// What a dispatched call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<O> {
    /// The single result of a plain call.
    Value(Datum),

    /// The directive of a trigger call.
    Trigger(TriggerOutcome),

    /// A materialized set.
    Materialized(ResultBuffer),

    /// One value of a value-per-call set.
    Next(Datum),

    /// The value-per-call set is exhausted.
    Done,

    /// The module of a preloaded procedure.
    Module(O),
}
