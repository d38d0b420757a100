//! The interpreter-side exception representation.

use std::fmt::Display;

use getset::Getters;
use plembed_diagnostic::ErrorRecord;

/// The class of an [`Exception`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    /// Wraps a host error; the only kind that may carry an
    /// [`ErrorRecord`] or inhibit context attachment.
    Database,

    /// Raised by a trigger handler to cancel the triggering event.
    StopEvent,

    /// The end of an iteration.
    StopIteration,

    /// The interpreter's own interrupt.
    KeyboardInterrupt,

    /// A generic runtime failure.
    Runtime,

    /// A value of the wrong type.
    Type,

    /// A value of the right type but unsuitable content.
    Value,

    /// A lookup by name or key failed.
    Key,

    /// Any other class, by name.
    Other(String),
}

impl ExceptionKind {
    /// Returns the class name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Database => "Exception",
            Self::StopEvent => "StopEvent",
            Self::StopIteration => "StopIteration",
            Self::KeyboardInterrupt => "KeyboardInterrupt",
            Self::Runtime => "RuntimeError",
            Self::Type => "TypeError",
            Self::Value => "ValueError",
            Self::Key => "KeyError",
            Self::Other(name) => name,
        }
    }
}

/// The state of the attribute asking to leave the traceback out of the
/// host error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InhibitContext {
    /// The exception does not define the attribute.
    #[default]
    Absent,

    /// The attribute evaluated to the given truth value.
    Set(bool),

    /// Reading or evaluating the attribute failed.
    Unreadable,
}

/// A raised interpreter exception.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[get = "pub"]
pub struct Exception {
    /// Class of the exception.
    kind: ExceptionKind,

    /// Text of the exception.
    message: String,

    /// The host error this exception was created from.
    record: Option<ErrorRecord>,

    /// The context inhibition attribute.
    inhibit_context: InhibitContext,

    /// Traceback frames, outermost first.
    traceback: Vec<String>,
}

impl Exception {
    /// Creates an exception of any kind.
    #[must_use]
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            record: None,
            inhibit_context: InhibitContext::Absent,
            traceback: Vec::new(),
        }
    }

    /// Wraps a host error record.
    #[must_use]
    pub fn database(record: ErrorRecord) -> Self {
        let mut exception =
            Self::new(ExceptionKind::Database, record.message().clone());
        exception.record = Some(record);
        exception
    }

    /// Creates a `RuntimeError`.
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::Runtime, message)
    }

    /// Creates a `TypeError`.
    #[must_use]
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::Type, message)
    }

    /// Creates a `ValueError`.
    #[must_use]
    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::Value, message)
    }

    /// Creates a `StopEvent`.
    #[must_use]
    pub fn stop_event() -> Self { Self::new(ExceptionKind::StopEvent, "") }

    /// Creates a `StopIteration`.
    #[must_use]
    pub fn stop_iteration() -> Self {
        Self::new(ExceptionKind::StopIteration, "")
    }

    /// Sets the context inhibition attribute.
    #[must_use]
    pub fn with_inhibit_context(mut self, inhibit: InhibitContext) -> Self {
        self.inhibit_context = inhibit;
        self
    }

    /// Appends a traceback frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.traceback.push(frame.into());
        self
    }

    /// Returns `true` if the exception wraps a host error.
    #[must_use]
    pub fn is_database(&self) -> bool { self.kind == ExceptionKind::Database }

    /// Returns `true` if the exception is of the given kind.
    #[must_use]
    pub fn is(&self, kind: &ExceptionKind) -> bool { &self.kind == kind }

    /// Takes the wrapped host error record out of the exception.
    #[must_use]
    pub fn into_record(self) -> Option<ErrorRecord> { self.record }
}

impl Display for Exception {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            f.write_str(self.kind.name())
        } else {
            write!(f, "{}: {}", self.kind.name(), self.message)
        }
    }
}

impl std::error::Error for Exception {}
