//! Property tests for snapshot and rollback guarantees

use proptest::prelude::*;
use resman_core::*;
use resman_test_utils::{MockRemote, limit};
use std::sync::Arc;

const RESOURCE_TYPES: [&str; 3] = ["limits", "tasks", "users"];

#[derive(Debug, Clone)]
enum SeedEntry {
    List {
        resource: usize,
        page: u8,
        ids: Vec<i64>,
    },
    Detail {
        resource: usize,
        id: i64,
    },
}

fn seed_entry() -> impl Strategy<Value = SeedEntry> {
    prop_oneof![
        (0..3usize, 0..3u8, prop::collection::vec(0..8i64, 0..5))
            .prop_map(|(resource, page, ids)| SeedEntry::List { resource, page, ids }),
        (0..3usize, 0..8i64).prop_map(|(resource, id)| SeedEntry::Detail { resource, id }),
    ]
}

fn selector() -> impl Strategy<Value = KeySelector> {
    prop_oneof![
        (0..3usize).prop_map(|r| KeySelector::prefix(CacheKey::resource(RESOURCE_TYPES[r]))),
        (0..3usize).prop_map(|r| KeySelector::prefix(CacheKey::list_prefix(RESOURCE_TYPES[r]))),
        (0..3usize, 0..10i64)
            .prop_map(|(r, id)| KeySelector::exact(CacheKey::detail(RESOURCE_TYPES[r], id))),
    ]
}

fn build_store(seed: &[SeedEntry]) -> Arc<CacheStore> {
    let store = Arc::new(CacheStore::new());
    for entry in seed {
        match entry {
            SeedEntry::List { resource, page, ids } => store.set(
                CacheKey::list(RESOURCE_TYPES[*resource], [("page", page.to_string())]),
                CacheData::List(ids.iter().map(|id| limit(*id, "seeded")).collect()),
            ),
            SeedEntry::Detail { resource, id } => store.set(
                CacheKey::detail(RESOURCE_TYPES[*resource], *id),
                CacheData::Item(limit(*id, "seeded")),
            ),
        }
    }
    store
}

fn non_retryable_error() -> impl Strategy<Value = RemoteError> {
    prop_oneof![
        Just(RemoteError::validation("rejected").with_field_error("name", "is invalid")),
        Just(RemoteError::permission("denied")),
        Just(RemoteError::conflict("duplicate")),
        Just(RemoteError::new("teapot", "unexpected")),
    ]
}

proptest! {
    #[test]
    fn test_snapshot_inverse_law(
        seed in prop::collection::vec(seed_entry(), 0..12),
        selectors in prop::collection::vec(selector(), 0..6),
    ) {
        let store = build_store(&seed);
        let before = store.entries();
        let manager = SnapshotManager::new(Arc::clone(&store));

        let snapshot = manager.capture_selectors(&selectors);
        manager.restore(snapshot);

        prop_assert_eq!(store.entries(), before);
    }

    #[test]
    fn test_restore_undoes_arbitrary_writes(
        seed in prop::collection::vec(seed_entry(), 0..12),
        writes in prop::collection::vec(seed_entry(), 0..6),
        resource in 0..3usize,
    ) {
        let store = build_store(&seed);
        let manager = SnapshotManager::new(Arc::clone(&store));
        let scope = KeySelector::prefix(CacheKey::resource(RESOURCE_TYPES[resource]));
        let before: Vec<_> = store
            .entries()
            .into_iter()
            .filter(|e| scope.matches(&e.key))
            .collect();

        let snapshot = manager.capture_selectors(std::slice::from_ref(&scope));
        for write in writes {
            match write {
                SeedEntry::List { page, ids, .. } => store.set(
                    CacheKey::list(RESOURCE_TYPES[resource], [("page", page.to_string())]),
                    CacheData::List(ids.into_iter().map(|id| limit(id, "written")).collect()),
                ),
                SeedEntry::Detail { id, .. } => {
                    store.remove(&CacheKey::detail(RESOURCE_TYPES[resource], id));
                }
            }
        }
        manager.restore(snapshot);

        let after: Vec<_> = store
            .entries()
            .into_iter()
            .filter(|e| scope.matches(&e.key))
            .collect();
        prop_assert_eq!(after, before);
    }

    #[test]
    fn test_rollback_exactness(
        seed in prop::collection::vec(seed_entry(), 0..12),
        kind in prop_oneof![
            Just(MutationKind::Create),
            Just(MutationKind::Update),
            Just(MutationKind::Delete),
            Just(MutationKind::Toggle),
        ],
        resource in 0..3usize,
        id in 0..8i64,
        error in non_retryable_error(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let store = build_store(&seed);
        let before = store.entries();
        let engine = MutationEngine::builder()
            .config(EngineConfig::test())
            .store(Arc::clone(&store))
            .build()
            .unwrap();

        let resource_type = RESOURCE_TYPES[resource];
        let remote = MockRemote::failing(error);
        let target = (kind != MutationKind::Create).then_some(RecordId::Num(id));
        let payload = match kind {
            MutationKind::Toggle => ResourceRecord::new().with("active", false),
            _ => ResourceRecord::new().with("name", "changed"),
        };
        let descriptor = MutationDescriptor::new(kind, resource_type, target, payload, remote.clone());

        let result = runtime.block_on(engine.execute(descriptor));

        prop_assert!(result.is_err());
        prop_assert_eq!(remote.call_count(), 1);
        prop_assert_eq!(store.entries(), before);
    }
}
