//! Resolved procedures.

use std::{fmt::Display, sync::Arc};

use getset::{CopyGetters, Getters};
use typed_builder::TypedBuilder;

use crate::{
    descriptor::{TupleDescriptor, TypeDescriptor},
    host::Host,
};

/// Stable identifier of a stored procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcedureId(pub u32);

impl ProcedureId {
    /// Identifier of the inline-code pseudo procedure.
    pub const INLINE: Self = Self(0);
}

impl Display for ProcedureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The catalog row version a [`Procedure`] was built from.
///
/// Replacing the procedure's definition produces a different stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Visibility {
    /// Creating transaction of the catalog row.
    pub transaction: u64,

    /// Physical location of the catalog row.
    pub item: u64,
}

/// Declared volatility class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum Volatility {
    Immutable,
    Stable,
    #[default]
    Volatile,
}

/// A procedure as loaded from the host catalog.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters, TypedBuilder)]
pub struct Procedure {
    /// Stable identifier.
    #[get_copy = "pub"]
    id: ProcedureId,

    /// Unqualified name.
    #[get = "pub"]
    #[builder(setter(into))]
    name: String,

    /// Schema the procedure lives in.
    #[get = "pub"]
    #[builder(setter(into), default = "public".to_owned())]
    namespace: String,

    /// Body text handed to the interpreter.
    #[get = "pub"]
    #[builder(setter(into))]
    source: String,

    /// Whether the procedure returns a set.
    #[get_copy = "pub"]
    #[builder(default)]
    returns_set: bool,

    /// Whether `main` is a state source driven through continuation calls.
    #[get_copy = "pub"]
    #[builder(default)]
    stateful: bool,

    /// Declared volatility.
    #[get_copy = "pub"]
    #[builder(default)]
    volatility: Volatility,

    /// Declared parameters.
    #[get = "pub"]
    #[builder(default)]
    input: Arc<TupleDescriptor>,

    /// Declared result type.
    #[get = "pub"]
    output: Arc<TypeDescriptor>,

    /// Catalog version stamp.
    #[get_copy = "pub"]
    #[builder(default)]
    visibility: Visibility,
}

impl Procedure {
    /// Returns the schema-qualified name, used as the file name in
    /// tracebacks and error context.
    #[must_use]
    pub fn filename(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}()", self.namespace, self.name)
        }
    }

    /// Returns `true` if any parameter or the result is generic.
    #[must_use]
    pub fn is_polymorphic(&self) -> bool {
        self.output.is_polymorphic() || self.input.first_polymorphic().is_some()
    }

    /// Checks that neither the catalog row nor any parameter or result type
    /// has been superseded since this procedure was loaded.
    #[must_use]
    pub fn is_current<H: Host + ?Sized>(&self, host: &H) -> bool {
        if host.procedure_visibility(self.id) != Some(self.visibility) {
            return false;
        }

        host.type_is_current(&self.output)
            && self
                .input
                .attributes()
                .iter()
                .all(|attribute| host.type_is_current(attribute.ty()))
    }
}
