//! Host-native values exchanged with the interpreter.

/// One host value.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum Datum {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Array(Vec<Datum>),
    Row(Row),
}

impl Datum {
    /// Returns `true` for [`Datum::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool { matches!(self, Self::Null) }
}

/// A host-native row: a positional value sequence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    /// The attribute values in declaration order.
    pub values: Vec<Datum>,
}

impl Row {
    /// Creates a row from its values.
    #[must_use]
    pub const fn new(values: Vec<Datum>) -> Self { Self { values } }
}

impl From<Vec<Datum>> for Row {
    fn from(values: Vec<Datum>) -> Self { Self { values } }
}
