//! Type descriptors supplied by the host's type-resolution service.
//!
//! The runtime never looks at how a type encodes its values. It needs only
//! the identity of a type, its byte layout, whether it is generic, and the
//! shape of composites and arrays, which is enough for polymorphism
//! resolution and for building rows.

use std::{fmt::Display, sync::Arc};

use enum_as_inner::EnumAsInner;
use getset::{CopyGetters, Getters};
use plembed_diagnostic::ErrorRecord;

use crate::datum::Datum;

/// Stable identifier of a host type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(pub u32);

impl Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How values of a type are laid out by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layout {
    /// Fixed byte length, or `None` for variable-length types.
    pub length: Option<u16>,

    /// Whether values are passed by value rather than by reference.
    pub by_value: bool,
}

impl Layout {
    /// A variable-length, by-reference layout.
    pub const VARIABLE: Self = Self { length: None, by_value: false };

    /// A fixed-length, by-value layout.
    #[must_use]
    pub const fn fixed(length: u16) -> Self {
        Self { length: Some(length), by_value: true }
    }
}

/// Text and binary conversion entry points of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Codec {
    pub text_in: fn(&str) -> Result<Datum, ErrorRecord>,
    pub text_out: fn(&Datum) -> Result<String, ErrorRecord>,
    pub binary_in: fn(&[u8]) -> Result<Datum, ErrorRecord>,
    pub binary_out: fn(&Datum) -> Result<Vec<u8>, ErrorRecord>,
}

/// Pseudo types that only appear in signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum PseudoType {
    Any,
    AnyElement,
    AnyArray,
    AnyNonArray,
    AnyEnum,
    Record,
    Trigger,
    Void,
    Cstring,
}

impl PseudoType {
    /// Returns `true` for the generic placeholders substituted by
    /// polymorphism resolution.
    #[must_use]
    pub const fn is_polymorphic(self) -> bool {
        matches!(
            self,
            Self::AnyElement
                | Self::AnyArray
                | Self::AnyNonArray
                | Self::AnyEnum
        )
    }
}

/// The category of a type.
#[derive(Debug, Clone, PartialEq, Eq, EnumAsInner)]
#[allow(missing_docs)]
pub enum TypeKind {
    Bool,
    Bytea,
    Numeric,
    String,
    Composite(Arc<TupleDescriptor>),
    Array(Arc<TypeDescriptor>),
    Domain(Arc<TypeDescriptor>),
    Pseudo(PseudoType),
    Other,
}

/// A resolved host type.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct TypeDescriptor {
    /// Identity of the type.
    #[get_copy = "pub"]
    id: TypeId,

    /// Name of the type.
    #[get = "pub"]
    name: String,

    /// Byte layout.
    #[get_copy = "pub"]
    layout: Layout,

    /// Category, with nested descriptors for composites, arrays and domains.
    #[get = "pub"]
    kind: TypeKind,

    /// Conversion functions, absent for pseudo types.
    #[get_copy = "pub"]
    codec: Option<Codec>,

    /// Catalog version; the host bumps it whenever the definition changes.
    #[get_copy = "pub"]
    version: u64,
}

impl TypeDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub fn new(
        id: TypeId,
        name: impl Into<String>,
        layout: Layout,
        kind: TypeKind,
    ) -> Self {
        Self { id, name: name.into(), layout, kind, codec: None, version: 0 }
    }

    /// Creates a pseudo-type descriptor.
    #[must_use]
    pub fn pseudo(
        id: TypeId,
        name: impl Into<String>,
        pseudo: PseudoType,
    ) -> Self {
        Self::new(id, name, Layout::fixed(4), TypeKind::Pseudo(pseudo))
    }

    /// Sets the codec.
    #[must_use]
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Sets the catalog version.
    #[must_use]
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Returns the pseudo type, if this is one.
    #[must_use]
    pub const fn as_pseudo(&self) -> Option<PseudoType> {
        match self.kind {
            TypeKind::Pseudo(pseudo) => Some(pseudo),
            _ => None,
        }
    }

    /// Returns `true` if this is a generic placeholder.
    #[must_use]
    pub fn is_polymorphic(&self) -> bool {
        self.as_pseudo().is_some_and(PseudoType::is_polymorphic)
    }

    /// Returns `true` if this is the `void` pseudo type.
    #[must_use]
    pub fn is_void(&self) -> bool { self.as_pseudo() == Some(PseudoType::Void) }

    /// Returns the element type of an array, looking through domains.
    #[must_use]
    pub fn element(&self) -> Option<&Arc<Self>> {
        match &self.kind {
            TypeKind::Array(element) => Some(element),
            TypeKind::Domain(base) => base.element(),
            _ => None,
        }
    }

    /// Returns the row shape of a composite, looking through domains.
    #[must_use]
    pub fn tuple(&self) -> Option<&Arc<TupleDescriptor>> {
        match &self.kind {
            TypeKind::Composite(tuple) => Some(tuple),
            TypeKind::Domain(base) => base.tuple(),
            _ => None,
        }
    }
}

/// A named, typed position of a [`TupleDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, Getters, derive_new::new)]
#[get = "pub"]
pub struct Attribute {
    /// Attribute name.
    name: String,

    /// Attribute type.
    ty: Arc<TypeDescriptor>,
}

/// The shape of a row: an ordered list of attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Getters)]
#[get = "pub"]
pub struct TupleDescriptor {
    /// The attributes in position order.
    attributes: Vec<Attribute>,
}

impl TupleDescriptor {
    /// Creates a descriptor from its attributes.
    #[must_use]
    pub const fn new(attributes: Vec<Attribute>) -> Self { Self { attributes } }

    /// Returns the number of attributes.
    #[must_use]
    pub fn len(&self) -> usize { self.attributes.len() }

    /// Returns `true` if there are no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.attributes.is_empty() }

    /// Returns the position of the first generic attribute.
    #[must_use]
    pub fn first_polymorphic(&self) -> Option<usize> {
        self.attributes
            .iter()
            .position(|attribute| attribute.ty.is_polymorphic())
    }

    /// Returns the position of the attribute named `name`.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|attribute| attribute.name == name)
    }
}
