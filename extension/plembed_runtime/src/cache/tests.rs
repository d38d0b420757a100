use std::sync::Arc;

use proptest::{prop_assert, proptest};

use crate::{
    cache::{anchor_entry, CallCache, PolymorphCache, Registry, RegistryEntry},
    descriptor::{PseudoType, TypeId},
    epoch::{Epoch, EpochCounter},
    live::{Anchor, LiveObject, LiveObjects},
    procedure::{Procedure, ProcedureId},
    test::{int4, parameters},
};

fn entry(id: u32, module: u32) -> RegistryEntry<u32> {
    let procedure = Procedure::builder()
        .id(ProcedureId(id))
        .name("f")
        .source("")
        .output(int4())
        .build();

    RegistryEntry { procedure: Arc::new(procedure), module }
}

fn cache(epoch: Epoch, live: &mut LiveObjects<u32>) -> CallCache<u32> {
    let (procedure, module) = anchor_entry(live, &entry(1, 10));

    CallCache::new(epoch, procedure, module, parameters(vec![int4()]), int4())
}

#[test]
fn cache_is_stale_after_epoch_advances() {
    let counter = EpochCounter::default();
    let mut live = LiveObjects::default();
    let cache = cache(counter.current(), &mut live);

    assert!(cache.is_fresh(counter.current(), &live));
    assert_eq!(cache.resolve(&live).map(|resolved| resolved.module), Some(10));

    counter.advance();
    assert!(!cache.is_fresh(counter.current(), &live));
}

#[test]
fn cache_is_stale_once_live_set_is_cleared() {
    let epoch = Epoch::INITIAL;
    let mut live = LiveObjects::default();
    let cache = cache(epoch, &mut live);

    live.drain();

    assert!(!cache.is_fresh(epoch, &live));
    assert!(cache.resolve(&live).is_none());
}

#[test]
fn specialized_descriptor_discard_invalidates() {
    let epoch = Epoch::INITIAL;
    let mut live = LiveObjects::default();
    let key = live.register(LiveObject::Descriptor(int4()));
    let cache = cache(epoch, &mut live).with_specialized(vec![key]);

    assert!(cache.is_fresh(epoch, &live));

    live.discard(key);
    assert!(!cache.is_fresh(epoch, &live));
}

#[test]
fn pinned_cache_never_goes_stale() {
    let counter = EpochCounter::default();
    let live = LiveObjects::default();
    let entry = entry(0, 5);
    let cache = CallCache::new(
        Epoch::NEVER_STALE,
        Anchor::Pinned(LiveObject::Procedure(entry.procedure)),
        Anchor::Pinned(LiveObject::Module(entry.module)),
        parameters(Vec::new()),
        int4(),
    );

    for _ in 0..3 {
        counter.advance();
        assert!(cache.is_fresh(counter.current(), &live));
    }
}

#[test]
fn registry_replaces_by_procedure() {
    let mut registry = Registry::default();

    registry.insert(entry(3, 1));
    registry.insert(entry(3, 2));

    assert_eq!(registry.get(ProcedureId(3)).map(|e| e.module), Some(2));
    assert!(registry.remove(ProcedureId(3)).is_some());
    assert!(!registry.contains(ProcedureId(3)));
}

#[test]
fn polymorph_cache_evicts_oldest() {
    let mut cache = PolymorphCache::new(2);

    cache.insert(PseudoType::AnyElement, TypeId(1), int4());
    cache.insert(PseudoType::AnyElement, TypeId(2), int4());
    cache.insert(PseudoType::AnyArray, TypeId(1), int4());

    assert_eq!(cache.len(), 2);
    assert!(cache.get(PseudoType::AnyElement, TypeId(1)).is_none());
    assert!(cache.get(PseudoType::AnyArray, TypeId(1)).is_some());

    cache.evict(PseudoType::AnyArray, TypeId(1));
    assert_eq!(cache.len(), 1);
}

proptest! {
    #[test]
    fn polymorph_cache_stays_bounded(
        capacity in 1usize..8,
        targets in proptest::collection::vec(0u32..32, 0..64),
    ) {
        let mut cache = PolymorphCache::new(capacity);

        for target in targets {
            cache.insert(PseudoType::AnyElement, TypeId(target), int4());
            prop_assert!(cache.len() <= capacity);
            prop_assert!(
                cache.get(PseudoType::AnyElement, TypeId(target)).is_some(),
            );
        }
    }
}
