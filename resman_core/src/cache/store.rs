//! In-memory cache store
//!
//! All operations are synchronous and never block on I/O; a write is visible
//! to every subsequent read immediately. Locks are never held across an
//! `.await`, so the store is safe to share between tasks through an `Arc`.

use super::reads::{ReadRegistry, ReadTicket};
use super::{CacheData, CacheEntry, CacheKey, KeySelector};
use crate::error::RemoteError;
use chrono::Utc;
use log::{trace, warn};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;
use tokio::task::{AbortHandle, JoinHandle};

/// Default capacity of the change-event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Change notifications emitted by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// An entry was written
    Updated(CacheKey),
    /// An entry was removed
    Removed(CacheKey),
    /// An entry was marked stale and should be refetched
    Stale(CacheKey),
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entry_count: usize,
    pub stale_count: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub in_flight_reads: usize,
}

/// Keyed container of cached server-resource snapshots
pub struct CacheStore {
    entries: RwLock<BTreeMap<CacheKey, CacheEntry>>,
    reads: Mutex<ReadRegistry>,
    events: broadcast::Sender<CacheEvent>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create an empty store whose event channel buffers `capacity` events
    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            entries: RwLock::new(BTreeMap::new()),
            reads: Mutex::new(ReadRegistry::default()),
            events,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    // Writes cannot fail halfway, so a poisoned lock still guards consistent data.
    fn read_entries(&self) -> RwLockReadGuard<'_, BTreeMap<CacheKey, CacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, BTreeMap<CacheKey, CacheEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_reads(&self) -> MutexGuard<'_, ReadRegistry> {
        self.reads.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: CacheEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Get the entry stored under `key`
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.read_entries().get(key).cloned();
        match entry {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        entry
    }

    /// Store fresh data under `key`
    pub fn set(&self, key: CacheKey, data: CacheData) {
        trace!("cache set {key}");
        let entry = CacheEntry {
            key: key.clone(),
            data,
            fetched_at: Utc::now(),
            stale: false,
        };
        self.write_entries().insert(key.clone(), entry);
        self.emit(CacheEvent::Updated(key));
    }

    /// Apply `f` to the data under `key`, keeping its fetch metadata
    ///
    /// Returns `false` without calling `f` if the key is absent.
    pub fn update<F>(&self, key: &CacheKey, f: F) -> bool
    where
        F: FnOnce(&mut CacheData),
    {
        let updated = match self.write_entries().get_mut(key) {
            Some(entry) => {
                f(&mut entry.data);
                true
            }
            None => false,
        };
        if updated {
            trace!("cache update {key}");
            self.emit(CacheEvent::Updated(key.clone()));
        }
        updated
    }

    /// Remove the entry under `key`, returning it
    pub fn remove(&self, key: &CacheKey) -> Option<CacheEntry> {
        let removed = self.write_entries().remove(key);
        if removed.is_some() {
            trace!("cache remove {key}");
            self.emit(CacheEvent::Removed(key.clone()));
        }
        removed
    }

    /// All entries whose key starts with `prefix`, in key order
    pub fn query_by_prefix(&self, prefix: &CacheKey) -> Vec<CacheEntry> {
        self.read_entries()
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    /// Keys of all entries whose key starts with `prefix`
    pub fn keys_by_prefix(&self, prefix: &CacheKey) -> Vec<CacheKey> {
        self.read_entries()
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// All entries, in key order
    pub fn entries(&self) -> Vec<CacheEntry> {
        self.read_entries().values().cloned().collect()
    }

    /// Mark every entry under `selector` stale, returning how many were marked
    pub fn mark_stale(&self, selector: &KeySelector) -> usize {
        let marked: Vec<CacheKey> = {
            let mut entries = self.write_entries();
            entries
                .iter_mut()
                .filter(|(key, _)| selector.matches(key))
                .map(|(key, entry)| {
                    entry.stale = true;
                    key.clone()
                })
                .collect()
        };
        let count = marked.len();
        for key in marked {
            self.emit(CacheEvent::Stale(key));
        }
        count
    }

    /// Read the current state of exactly `keys` and everything under `prefixes`
    /// in one consistent pass
    pub(crate) fn capture(
        &self,
        keys: &[CacheKey],
        prefixes: &[CacheKey],
    ) -> BTreeMap<CacheKey, Option<CacheEntry>> {
        let entries = self.read_entries();
        let mut captured: BTreeMap<CacheKey, Option<CacheEntry>> = keys
            .iter()
            .map(|key| (key.clone(), entries.get(key).cloned()))
            .collect();
        for prefix in prefixes {
            for (key, entry) in entries
                .range(prefix.clone()..)
                .take_while(|(key, _)| key.starts_with(prefix))
            {
                captured.insert(key.clone(), Some(entry.clone()));
            }
        }
        captured
    }

    /// Write back captured entries verbatim in one pass
    ///
    /// Keys captured as absent are removed, as is any key that appeared under
    /// a captured prefix after the capture.
    pub(crate) fn restore(
        &self,
        captured: BTreeMap<CacheKey, Option<CacheEntry>>,
        prefixes: &[CacheKey],
    ) {
        let mut events = Vec::new();
        {
            let mut entries = self.write_entries();

            let appeared: Vec<CacheKey> = prefixes
                .iter()
                .flat_map(|prefix| {
                    entries
                        .range(prefix.clone()..)
                        .take_while(|(key, _)| key.starts_with(prefix))
                        .map(|(key, _)| key.clone())
                        .collect::<Vec<_>>()
                })
                .filter(|key| !captured.contains_key(key))
                .collect();
            for key in appeared {
                entries.remove(&key);
                events.push(CacheEvent::Removed(key));
            }

            for (key, entry) in captured {
                match entry {
                    Some(entry) => {
                        if entries.get(&key) != Some(&entry) {
                            entries.insert(key.clone(), entry);
                            events.push(CacheEvent::Updated(key));
                        }
                    }
                    None => {
                        if entries.remove(&key).is_some() {
                            events.push(CacheEvent::Removed(key));
                        }
                    }
                }
            }
        }
        for event in events {
            self.emit(event);
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    /// Remove all entries and abort every tracked read
    pub fn clear(&self) {
        let keys: Vec<CacheKey> = std::mem::take(&mut *self.write_entries())
            .into_keys()
            .collect();
        self.lock_reads()
            .cancel_matching(&[KeySelector::prefix(CacheKey::new(Vec::new()))]);
        for key in keys {
            self.emit(CacheEvent::Removed(key));
        }
    }

    /// Subscribe to change events
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Register an in-flight background read of `key`
    pub fn track_read(&self, key: CacheKey, handle: AbortHandle) -> ReadTicket {
        self.lock_reads().track(key, handle)
    }

    /// Forget a finished read; returns `false` if it was already cancelled
    pub fn finish_read(&self, ticket: &ReadTicket) -> bool {
        self.lock_reads().untrack(ticket)
    }

    /// Abort every tracked read whose key falls under `selectors`
    pub fn cancel_reads(&self, selectors: &[KeySelector]) -> usize {
        let cancelled = self.lock_reads().cancel_matching(selectors);
        for key in &cancelled {
            trace!("cancelled in-flight read of {key}");
        }
        cancelled.len()
    }

    /// Write a finished read's result unless it was cancelled first
    ///
    /// The reads lock is held across the write so `cancel_reads` cannot
    /// slip in between the untrack and the write.
    fn commit_read(&self, ticket: &ReadTicket, key: CacheKey, data: CacheData) -> bool {
        let mut reads = self.lock_reads();
        if !reads.untrack(ticket) {
            return false;
        }
        self.set(key, data);
        drop(reads);
        true
    }

    /// Number of tracked in-flight reads
    pub fn in_flight_reads(&self) -> usize {
        self.lock_reads().len()
    }

    /// Spawn a tracked background read that stores its result under `key`
    ///
    /// The result is written only if the read was not cancelled first.
    pub fn spawn_fetch<F>(self: &Arc<Self>, key: CacheKey, fetch: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<CacheData, RemoteError>> + Send + 'static,
    {
        let mut reads = self.lock_reads();
        let store = Arc::clone(self);
        let (ticket_tx, ticket_rx) = tokio::sync::oneshot::channel::<ReadTicket>();
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let result = fetch.await;
            let Ok(ticket) = ticket_rx.await else {
                return;
            };
            match result {
                Ok(data) => {
                    if !store.commit_read(&ticket, task_key.clone(), data) {
                        trace!("dropped result of cancelled read of {task_key}");
                    }
                }
                Err(err) => {
                    if store.finish_read(&ticket) {
                        warn!("background read of {task_key} failed: {err}");
                    }
                }
            }
        });
        let ticket = reads.track(key, handle.abort_handle());
        drop(reads);
        let _ = ticket_tx.send(ticket);
        handle
    }

    /// Current statistics
    pub fn stats(&self) -> CacheStats {
        // Reads lock before entries lock, never nested the other way
        let in_flight_reads = self.in_flight_reads();
        let entries = self.read_entries();
        CacheStats {
            entry_count: entries.len(),
            stale_count: entries.values().filter(|e| e.stale).count(),
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
            in_flight_reads,
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}
