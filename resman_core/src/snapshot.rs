//! Snapshot capture and restore
//!
//! A [`Snapshot`] is an immutable point-in-time copy of the cache entries a
//! mutation may touch, including "absent" markers for keys with no entry.
//! Restoring a snapshot writes every captured value back verbatim.

use crate::cache::{CacheEntry, CacheKey, CacheStore, KeyScope, KeySelector};
use chrono::{DateTime, Utc};
use log::trace;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Point-in-time copy of selected cache entries
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    entries: BTreeMap<CacheKey, Option<CacheEntry>>,
    prefixes: Vec<CacheKey>,
    taken_at: DateTime<Utc>,
}

impl Snapshot {
    /// Captured keys, in key order
    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.entries.keys()
    }

    /// Captured state of `key`: `None` if not captured, `Some(None)` if
    /// captured as absent
    pub fn get(&self, key: &CacheKey) -> Option<Option<&CacheEntry>> {
        self.entries.get(key).map(Option::as_ref)
    }

    /// Whether `key` was captured
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of captured keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was captured
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// When the snapshot was taken
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }
}

/// Captures and restores snapshots of a cache store
#[derive(Clone)]
pub struct SnapshotManager {
    store: Arc<CacheStore>,
}

impl SnapshotManager {
    /// Create a manager over `store`
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    /// Capture exactly `keys`
    pub fn capture(&self, keys: &[CacheKey]) -> Snapshot {
        self.take(keys, Vec::new())
    }

    /// Capture every key matched by `selectors`
    ///
    /// Prefix selectors capture all keys currently under the prefix; on
    /// restore, keys that appeared under the prefix afterwards are removed.
    pub fn capture_selectors(&self, selectors: &[KeySelector]) -> Snapshot {
        let mut exact = Vec::new();
        let mut prefixes = Vec::new();
        for selector in selectors {
            match selector.scope {
                KeyScope::Exact => exact.push(selector.key.clone()),
                KeyScope::Prefix => prefixes.push(selector.key.clone()),
            }
        }
        self.take(&exact, prefixes)
    }

    fn take(&self, keys: &[CacheKey], prefixes: Vec<CacheKey>) -> Snapshot {
        let entries = self.store.capture(keys, &prefixes);
        trace!("captured snapshot of {} key(s)", entries.len());
        Snapshot {
            entries,
            prefixes,
            taken_at: Utc::now(),
        }
    }

    /// Write the snapshot back, consuming it
    pub fn restore(&self, snapshot: Snapshot) {
        trace!("restoring snapshot of {} key(s)", snapshot.entries.len());
        self.store.restore(snapshot.entries, &snapshot.prefixes);
    }
}
