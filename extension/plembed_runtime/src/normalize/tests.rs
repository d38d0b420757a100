use std::sync::Arc;

use crate::{
    descriptor::{
        Attribute, Layout, TupleDescriptor, TypeDescriptor, TypeId, TypeKind,
    },
    normalize::{normalize, NormalizeError, RowView},
};

fn shape() -> TupleDescriptor {
    let int = Arc::new(TypeDescriptor::new(
        TypeId(23),
        "int4",
        Layout::fixed(4),
        TypeKind::Numeric,
    ));

    TupleDescriptor::new(vec![
        Attribute::new("id".to_owned(), int.clone()),
        Attribute::new("qty".to_owned(), int),
    ])
}

#[test]
fn sequence_must_match_length() {
    assert_eq!(
        normalize(&shape(), RowView::Sequence(vec![1, 2]), || 0),
        Ok(vec![1, 2]),
    );
    assert_eq!(
        normalize(&shape(), RowView::Sequence(vec![1]), || 0),
        Err(NormalizeError::WrongShape { expected: 2, actual: 1 })
    );
}

#[test]
fn mapping_is_reordered_and_padded() {
    let view = RowView::Mapping(vec![("qty".to_owned(), 5)]);

    assert_eq!(normalize(&shape(), view, || -1), Ok(vec![-1, 5]));
}

#[test]
fn mapping_rejects_unknown_fields() {
    let view = RowView::Mapping(vec![("price".to_owned(), 5)]);

    assert_eq!(
        normalize(&shape(), view, || 0),
        Err(NormalizeError::UnknownField("price".to_owned()))
    );
}
