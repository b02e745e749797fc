//! Per-resource-type mutation lanes
//!
//! Every resource type gets one FIFO lane. A mutation holds the lanes of all
//! resource types it touches from before its snapshot until it settles, so a
//! second mutation on the same resource waits for the first to finish and
//! never snapshots an optimistic state. Lanes are always acquired in sorted
//! order, so mutations touching several resource types cannot deadlock.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as LaneLock, OwnedMutexGuard};

/// Held lanes; dropping it releases them
#[derive(Debug)]
pub struct LanePermit {
    resource_types: Vec<String>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl LanePermit {
    /// Resource types whose lanes are held, sorted
    pub fn resource_types(&self) -> &[String] {
        &self.resource_types
    }
}

/// Serializes mutations per resource type
#[derive(Debug, Default)]
pub struct MutationQueue {
    lanes: Mutex<HashMap<String, Arc<LaneLock<()>>>>,
}

impl MutationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lane(&self, resource_type: &str) -> Arc<LaneLock<()>> {
        let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(lanes.entry(resource_type.to_string()).or_default())
    }

    /// Wait for, then hold, the lanes of every type in `resource_types`
    pub async fn acquire(&self, resource_types: &BTreeSet<String>) -> LanePermit {
        let mut guards = Vec::with_capacity(resource_types.len());
        for resource_type in resource_types {
            guards.push(self.lane(resource_type).lock_owned().await);
        }
        LanePermit {
            resource_types: resource_types.iter().cloned().collect(),
            _guards: guards,
        }
    }

    /// Whether a mutation currently holds the lane of `resource_type`
    pub fn is_busy(&self, resource_type: &str) -> bool {
        let lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
        lanes
            .get(resource_type)
            .is_some_and(|lane| lane.try_lock().is_err())
    }

    /// Number of lanes created so far
    pub fn lane_count(&self) -> usize {
        self.lanes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn types(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_permit_holds_lane() {
        let queue = MutationQueue::new();
        let permit = queue.acquire(&types(&["limits", "services"])).await;

        assert_eq!(permit.resource_types(), ["limits", "services"]);
        assert!(queue.is_busy("limits"));
        assert!(queue.is_busy("services"));
        assert!(!queue.is_busy("users"));

        drop(permit);
        assert!(!queue.is_busy("limits"));
        // Querying a type never creates its lane
        assert_eq!(queue.lane_count(), 2);
    }

    #[tokio::test]
    async fn test_same_lane_waits() {
        let queue = Arc::new(MutationQueue::new());
        let first = queue.acquire(&types(&["limits"])).await;

        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let _permit = queue.acquire(&types(&["limits"])).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_disjoint_lanes_do_not_wait() {
        let queue = MutationQueue::new();
        let _limits = queue.acquire(&types(&["limits"])).await;

        let users = tokio::time::timeout(Duration::from_millis(100), queue.acquire(&types(&["users"])))
            .await;
        assert!(users.is_ok());
    }
}
