//! Built-in optimistic transforms and post-commit reconciliation
//!
//! Transforms run synchronously between snapshot and remote call; every key
//! they may write is covered by the descriptor's touched selectors.

use super::{MutationKind, TransformContext};
use crate::cache::{CacheData, CacheKey, CacheStore};
use crate::record::{RecordId, ResourceRecord};

/// Run the built-in transform for `context.kind`
pub fn apply_builtin(store: &CacheStore, context: &TransformContext) {
    match context.kind {
        MutationKind::Create => insert_created(store, context),
        MutationKind::Update | MutationKind::Toggle => merge_updated(store, context),
        MutationKind::Delete => remove_deleted(store, context),
    }
}

/// Prepend the new record to every list and write its detail entry
pub fn insert_created(store: &CacheStore, context: &TransformContext) {
    let Some(id) = &context.target else {
        return;
    };
    for key in store.keys_by_prefix(&CacheKey::list_prefix(&context.resource_type)) {
        store.update(&key, |data| {
            if let CacheData::List(records) = data {
                records.insert(0, context.payload.clone());
            }
        });
    }
    store.set(
        CacheKey::detail(&context.resource_type, id.clone()),
        CacheData::Item(context.payload.clone()),
    );
}

/// Shallow-merge the payload into every cached copy of the target
pub fn merge_updated(store: &CacheStore, context: &TransformContext) {
    let Some(id) = &context.target else {
        return;
    };
    for key in keys_containing(store, &context.resource_type, id) {
        store.update(&key, |data| match data {
            CacheData::Item(record) => record.merge(&context.payload),
            CacheData::List(records) => records
                .iter_mut()
                .filter(|r| r.has_id(id))
                .for_each(|r| r.merge(&context.payload)),
        });
    }
}

/// Drop the target from every list and remove its detail entry
pub fn remove_deleted(store: &CacheStore, context: &TransformContext) {
    if let Some(id) = &context.target {
        remove_everywhere(store, &context.resource_type, id);
    }
}

/// Replace the optimistic guess with the authoritative server state
///
/// Returns the id of the committed record, when known.
pub(crate) fn reconcile(
    store: &CacheStore,
    kind: MutationKind,
    resource_type: &str,
    target: Option<&RecordId>,
    server: Option<&ResourceRecord>,
) -> Option<RecordId> {
    match kind {
        MutationKind::Create => {
            let temp_id = target?;
            match server.and_then(|record| record.id().map(|id| (id, record))) {
                Some((server_id, record)) => {
                    swap_temporary(store, resource_type, temp_id, &server_id, record);
                    Some(server_id)
                }
                None => {
                    purge_temporary(store, temp_id);
                    None
                }
            }
        }
        MutationKind::Update | MutationKind::Toggle => {
            let id = target?;
            if let Some(record) = server {
                let record = match record.id() {
                    Some(_) => record.clone(),
                    None => record.clone().with_id(id),
                };
                overwrite(store, resource_type, id, &record);
            }
            Some(id.clone())
        }
        MutationKind::Delete => {
            let id = target?;
            remove_everywhere(store, resource_type, id);
            Some(id.clone())
        }
    }
}

fn swap_temporary(
    store: &CacheStore,
    resource_type: &str,
    temp_id: &RecordId,
    server_id: &RecordId,
    record: &ResourceRecord,
) {
    let temp_detail = CacheKey::detail(resource_type, temp_id.clone());
    store.remove(&temp_detail);

    for entry in store.entries() {
        if !entry.data.contains_id(temp_id) {
            continue;
        }
        store.update(&entry.key, |data| match data {
            CacheData::Item(item) => *item = record.clone(),
            CacheData::List(records) => {
                records.retain(|r| !r.has_id(server_id));
                for r in records.iter_mut().filter(|r| r.has_id(temp_id)) {
                    *r = record.clone();
                }
            }
        });
    }

    store.set(
        CacheKey::detail(resource_type, server_id.clone()),
        CacheData::Item(record.clone()),
    );
}

fn purge_temporary(store: &CacheStore, temp_id: &RecordId) {
    for entry in store.entries() {
        if !entry.data.contains_id(temp_id) {
            continue;
        }
        match entry.data {
            CacheData::Item(_) => {
                store.remove(&entry.key);
            }
            CacheData::List(_) => {
                store.update(&entry.key, |data| {
                    if let CacheData::List(records) = data {
                        records.retain(|r| !r.has_id(temp_id));
                    }
                });
            }
        }
    }
}

fn overwrite(store: &CacheStore, resource_type: &str, id: &RecordId, record: &ResourceRecord) {
    for key in keys_containing(store, resource_type, id) {
        store.update(&key, |data| match data {
            CacheData::Item(item) => *item = record.clone(),
            CacheData::List(records) => records
                .iter_mut()
                .filter(|r| r.has_id(id))
                .for_each(|r| *r = record.clone()),
        });
    }
}

fn remove_everywhere(store: &CacheStore, resource_type: &str, id: &RecordId) {
    for key in keys_containing(store, resource_type, id) {
        if key.is_detail() {
            store.remove(&key);
        } else {
            store.update(&key, |data| {
                if let CacheData::List(records) = data {
                    records.retain(|r| !r.has_id(id));
                }
            });
        }
    }
}

/// Keys under the resource type whose data carries `id`
/// Whether any cached entry of `resource_type` holds `id`
pub(crate) fn is_cached(store: &CacheStore, resource_type: &str, id: &RecordId) -> bool {
    !keys_containing(store, resource_type, id).is_empty()
}

fn keys_containing(store: &CacheStore, resource_type: &str, id: &RecordId) -> Vec<CacheKey> {
    store
        .query_by_prefix(&CacheKey::resource(resource_type))
        .into_iter()
        .filter(|entry| entry.data.contains_id(id))
        .map(|entry| entry.key)
        .collect()
}
