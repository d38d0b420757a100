use crate::{Handler, Storage};

#[test]
fn storage_keeps_arrival_order() {
    let storage = Storage::<String>::new();

    storage.receive("first");
    storage.receive("second");

    assert_eq!(storage.len(), 2);
    assert_eq!(storage.as_vec().as_slice(), ["first", "second"]);
}

#[test]
fn storage_behind_trait_object() {
    let storage = Storage::<u32>::default();
    let handler: &dyn Handler<u32> = &storage;

    assert!(storage.is_empty());
    handler.receive(7);

    assert_eq!(storage.read().as_slice(), [7]);
}
