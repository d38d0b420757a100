//! Conversion of loosely shaped rows into positional form.

use crate::{
    descriptor::TupleDescriptor,
    exception::{Exception, ExceptionKind},
};

/// How interpreted code presented a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowView<O> {
    /// Values keyed by attribute name.
    Mapping(Vec<(String, O)>),

    /// Values in attribute order.
    Sequence(Vec<O>),
}

/// A row does not fit a [`TupleDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// A sequence of the wrong length.
    #[error(
        "row has {actual} items, but the target shape has {expected} \
         attributes"
    )]
    WrongShape {
        /// Attributes of the target.
        expected: usize,
        /// Items supplied.
        actual: usize,
    },

    /// A mapping key that names no attribute.
    #[error("unknown field \"{0}\" in row mapping")]
    UnknownField(String),
}

impl From<NormalizeError> for Exception {
    fn from(error: NormalizeError) -> Self {
        match error {
            NormalizeError::WrongShape { .. } => {
                Self::type_error(error.to_string())
            }
            NormalizeError::UnknownField(_) => {
                Self::new(ExceptionKind::Key, error.to_string())
            }
        }
    }
}

/// Arranges `view` in the attribute order of `descriptor`.
///
/// Attributes a mapping does not mention are filled with `missing()`.
///
/// # Errors
///
/// [`NormalizeError::WrongShape`] for a sequence whose length differs from
/// the attribute count, [`NormalizeError::UnknownField`] for a mapping key
/// naming no attribute.
pub fn normalize<O>(
    descriptor: &TupleDescriptor,
    view: RowView<O>,
    mut missing: impl FnMut() -> O,
) -> Result<Vec<O>, NormalizeError> {
    match view {
        RowView::Sequence(values) => {
            if values.len() == descriptor.len() {
                Ok(values)
            } else {
                Err(NormalizeError::WrongShape {
                    expected: descriptor.len(),
                    actual: values.len(),
                })
            }
        }
        RowView::Mapping(entries) => {
            let mut slots = descriptor
                .attributes()
                .iter()
                .map(|_| None)
                .collect::<Vec<_>>();

            for (name, value) in entries {
                let position = descriptor
                    .position(&name)
                    .ok_or_else(|| NormalizeError::UnknownField(name.clone()))?;
                slots[position] = Some(value);
            }

            Ok(slots
                .into_iter()
                .map(|slot| slot.unwrap_or_else(&mut missing))
                .collect())
        }
    }
}

#[cfg(test)]
mod tests;
