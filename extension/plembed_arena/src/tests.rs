use proptest::{prop_assert, prop_assert_eq, prop_assume, proptest};

use crate::{Arena, Key};

#[test]
fn insert_get_remove() {
    let mut arena = Arena::new();

    let a = arena.insert("a");
    let b = arena.insert("b");

    assert_eq!(arena.len(), 2);
    assert_eq!(arena.get(a), Some(&"a"));
    assert_eq!(arena.remove(b), Some("b"));
    assert!(!arena.contains_key(b));
    assert!(arena.contains_key(a));
    assert_eq!(arena.len(), 1);
}

#[test]
fn drain_invalidates_keys_even_when_index_is_reused() {
    let mut arena = Arena::new();

    let old = arena.insert(1);
    assert_eq!(arena.drain(), vec![1]);

    let new = arena.insert(2);

    assert_eq!(old.index(), new.index());
    assert_ne!(old, new);
    assert_eq!(arena.get(old), None);
    assert_eq!(arena.remove(old), None);
    assert_eq!(arena.get(new), Some(&2));
}

proptest! {
    #[test]
    fn foreign_generation_never_resolves(
        key in proptest::arbitrary::any::<Key<u8>>()
    ) {
        let mut arena = Arena::new();
        prop_assume!(key.generation() != arena.generation());

        for value in 0..4_u8 {
            arena.insert(value);
        }

        prop_assert!(arena.get(key).is_none());
        prop_assert!(arena.remove(key).is_none());
    }

    #[test]
    fn drained_count_matches_inserted(count in 0_usize..64) {
        let mut arena = Arena::new();
        for value in 0..count {
            arena.insert(value);
        }

        let generation = arena.generation();
        prop_assert_eq!(arena.drain().len(), count);
        prop_assert_eq!(arena.generation(), generation + 1);
        prop_assert!(arena.is_empty());
    }
}
