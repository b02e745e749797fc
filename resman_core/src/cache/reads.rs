//! Tracking of in-flight background reads
//!
//! The UI data-fetching layer registers its refetches here so that a mutation
//! can abort any read touching its keys before applying an optimistic write.
//! Only reads are ever cancelled; a mutation's own remote call is not tracked.

use super::{CacheKey, KeySelector};
use std::collections::HashMap;
use tokio::task::AbortHandle;

/// Identifies one tracked read
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ReadTicket {
    id: u64,
}

impl ReadTicket {
    /// Numeric id of this ticket
    pub fn id(&self) -> u64 {
        self.id
    }
}

struct TrackedRead {
    key: CacheKey,
    handle: AbortHandle,
}

#[derive(Default)]
pub(crate) struct ReadRegistry {
    next_id: u64,
    reads: HashMap<u64, TrackedRead>,
}

impl ReadRegistry {
    pub(crate) fn track(&mut self, key: CacheKey, handle: AbortHandle) -> ReadTicket {
        self.next_id += 1;
        let id = self.next_id;
        self.reads.insert(id, TrackedRead { key, handle });
        ReadTicket { id }
    }

    pub(crate) fn untrack(&mut self, ticket: &ReadTicket) -> bool {
        self.reads.remove(&ticket.id).is_some()
    }

    pub(crate) fn cancel_matching(&mut self, selectors: &[KeySelector]) -> Vec<CacheKey> {
        let ids: Vec<u64> = self
            .reads
            .iter()
            .filter(|(_, read)| selectors.iter().any(|s| s.matches(&read.key)))
            .map(|(id, _)| *id)
            .collect();

        ids.into_iter()
            .filter_map(|id| self.reads.remove(&id))
            .map(|read| {
                read.handle.abort();
                read.key
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.reads.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_matching_aborts_only_selected() {
        let mut registry = ReadRegistry::default();

        let limits = tokio::spawn(tokio::time::sleep(Duration::from_secs(30)));
        let users = tokio::spawn(tokio::time::sleep(Duration::from_secs(30)));
        registry.track(CacheKey::detail("limits", 1), limits.abort_handle());
        let users_ticket = registry.track(CacheKey::detail("users", 1), users.abort_handle());

        let cancelled =
            registry.cancel_matching(&[KeySelector::prefix(CacheKey::resource("limits"))]);

        assert_eq!(cancelled, vec![CacheKey::detail("limits", 1)]);
        assert_eq!(registry.len(), 1);
        assert!(limits.await.unwrap_err().is_cancelled());
        assert!(registry.untrack(&users_ticket));
        users.abort();
    }

    #[test]
    fn test_ticket_ids_increase() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut registry = ReadRegistry::default();
        let handle = runtime.spawn(async {});
        let first = registry.track(CacheKey::resource("a"), handle.abort_handle());
        let second = registry.track(CacheKey::resource("b"), handle.abort_handle());
        assert!(second.id() > first.id());
    }
}
