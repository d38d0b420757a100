//! The host's structured error representation.
//!
//! An [`ErrorRecord`] is what the host database raises, reports and shows to
//! clients: a [`Severity`], a five character [`SqlState`], a primary message
//! and optional detail, hint, context lines and source location.

use std::fmt::Display;

use getset::{CopyGetters, Getters};
use strum_macros::IntoStaticStr;

pub mod sql_state;

pub use sql_state::{InvalidSqlStateError, SqlState};

/// Severity of an [`ErrorRecord`], ordered from least to most severe.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    IntoStaticStr,
)]
#[cfg_attr(test, derive(strum_macros::EnumIter))]
#[strum(serialize_all = "UPPERCASE")]
#[allow(missing_docs)]
pub enum Severity {
    Debug,
    Log,
    Info,
    Notice,
    Warning,
    #[default]
    Error,
    Fatal,
    Panic,
}

impl Severity {
    /// Returns `true` if a record of this severity aborts the current
    /// operation instead of merely being reported.
    #[must_use]
    pub fn is_error(self) -> bool { self >= Self::Error }
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(<&'static str>::from(*self))
    }
}

/// Where in the host an [`ErrorRecord`] was raised.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Getters, derive_new::new)]
#[get = "pub"]
pub struct Location {
    /// Source file.
    file: String,

    /// Line within [`Self::file`].
    line: u32,

    /// Function name.
    function: String,
}

/// A structured host error.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct ErrorRecord {
    /// How severe the record is.
    #[get_copy = "pub"]
    severity: Severity,

    /// The SQL-state classifying the record.
    #[get_copy = "pub"]
    code: SqlState,

    /// The primary message.
    #[get = "pub"]
    message: String,

    /// Optional secondary message.
    #[get = "pub"]
    detail: Option<String>,

    /// Optional suggestion.
    #[get = "pub"]
    hint: Option<String>,

    /// Context lines, innermost first.
    #[get = "pub"]
    context: Vec<String>,

    /// Where the record was raised.
    #[get = "pub"]
    location: Option<Location>,
}

impl ErrorRecord {
    /// Creates a record with the given severity, code and message.
    #[must_use]
    pub fn new(
        severity: Severity,
        code: SqlState,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            detail: None,
            hint: None,
            context: Vec::new(),
            location: None,
        }
    }

    /// Creates an `ERROR` record.
    #[must_use]
    pub fn error(code: SqlState, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Creates a `WARNING` record.
    #[must_use]
    pub fn warning(code: SqlState, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    /// Creates the payload-free marker record used to unwind host frames
    /// after an error was already converted into an interpreter exception.
    #[must_use]
    pub fn relay() -> Self {
        Self::new(Severity::Error, SqlState::RELAY, "exception relay")
    }

    /// Returns `true` for a record created by [`Self::relay`].
    #[must_use]
    pub fn is_relay(&self) -> bool { self.code == SqlState::RELAY }

    /// Sets the detail message.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Sets the hint message.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Appends a context line.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.push_context(context);
        self
    }

    /// Sets the source location.
    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Overrides the severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Appends a context line in place.
    pub fn push_context(&mut self, context: impl Into<String>) {
        self.context.push(context.into());
    }
}

impl Display for ErrorRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:  {}", self.severity, self.message)?;

        if let Some(detail) = &self.detail {
            write!(f, "\nDETAIL:  {detail}")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\nHINT:  {hint}")?;
        }
        for context in &self.context {
            write!(f, "\nCONTEXT:  {context}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorRecord {}

#[cfg(test)]
mod tests;
