//! The mutation engine
//!
//! Owns every shared component and runs each descriptor through its own
//! coordinator. The engine is `Send + Sync`; share it between tasks through
//! an `Arc` and call [`MutationEngine::execute`] concurrently.

use super::coordinator::{MutationCoordinator, MutationOutcome};
use super::queue::MutationQueue;
use super::MutationDescriptor;
use crate::EngineConfig;
use crate::cache::CacheStore;
use crate::catalog::ResourceCatalog;
use crate::error::{ConfigError, Result};
use crate::invalidation::InvalidationPlanner;
use crate::metrics::MetricsRecorder;
use crate::notification::{NullNotifier, Notifier};
use crate::record::TempIdGenerator;
use crate::retry::RetryPolicy;
use crate::snapshot::SnapshotManager;
use std::sync::Arc;
use std::time::Duration;

/// Generic optimistic mutation engine
pub struct MutationEngine {
    pub(crate) store: Arc<CacheStore>,
    pub(crate) snapshots: SnapshotManager,
    pub(crate) planner: InvalidationPlanner,
    pub(crate) retry: RetryPolicy,
    pub(crate) metrics: Arc<MetricsRecorder>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) queue: MutationQueue,
    pub(crate) temp_ids: TempIdGenerator,
    pub(crate) catalog: ResourceCatalog,
    config: EngineConfig,
}

impl MutationEngine {
    /// Start building an engine
    pub fn builder() -> MutationEngineBuilder {
        MutationEngineBuilder::default()
    }

    /// Run one mutation to completion
    ///
    /// Resolves after the mutation settles: on success the cache holds the
    /// server state and the planned targets are stale; on failure the cache
    /// has been rolled back before the error is returned.
    pub async fn execute(&self, descriptor: MutationDescriptor) -> Result<MutationOutcome> {
        let outcome = MutationCoordinator::new(self, descriptor).run().await?;
        Ok(outcome)
    }

    /// The cache store shared with the UI layer
    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    pub fn catalog(&self) -> &ResourceCatalog {
        &self.catalog
    }

    pub fn planner(&self) -> &InvalidationPlanner {
        &self.planner
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether a mutation on `resource_type` is currently in progress
    pub fn is_busy(&self, resource_type: &str) -> bool {
        self.queue.is_busy(resource_type)
    }
}

/// Builder for [`MutationEngine`]
#[derive(Default)]
pub struct MutationEngineBuilder {
    config: EngineConfig,
    store: Option<Arc<CacheStore>>,
    catalog: Option<ResourceCatalog>,
    planner: Option<InvalidationPlanner>,
    notifier: Option<Arc<dyn Notifier>>,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl MutationEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an existing store instead of creating one
    pub fn store(mut self, store: Arc<CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Resource catalog; defaults to [`ResourceCatalog::console`]
    pub fn catalog(mut self, catalog: ResourceCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Invalidation planner; defaults to one built from the catalog
    pub fn planner(mut self, planner: InvalidationPlanner) -> Self {
        self.planner = Some(planner);
        self
    }

    /// Notification sink; defaults to [`NullNotifier`]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the configuration and build the engine
    pub fn build(self) -> std::result::Result<MutationEngine, ConfigError> {
        self.config.validate()?;
        let retry = RetryPolicy::from_config(&self.config)?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(CacheStore::with_event_capacity(self.config.event_capacity)));
        let catalog = self.catalog.unwrap_or_else(ResourceCatalog::console);
        let planner = self
            .planner
            .unwrap_or_else(|| InvalidationPlanner::from_catalog(&catalog));
        let metrics = self.metrics.unwrap_or_else(|| {
            Arc::new(
                MetricsRecorder::with_capacity(self.config.metrics_capacity).with_slow_threshold(
                    Duration::from_millis(self.config.slow_threshold_ms),
                ),
            )
        });

        Ok(MutationEngine {
            snapshots: SnapshotManager::new(Arc::clone(&store)),
            store,
            planner,
            retry,
            metrics,
            notifier: self.notifier.unwrap_or_else(|| Arc::new(NullNotifier)),
            queue: MutationQueue::new(),
            temp_ids: TempIdGenerator::new(),
            catalog,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheData, CacheKey};
    use crate::error::{Error, ErrorKind, MutationError, RemoteError};
    use crate::mutation::{MutationKind, MutationState, remote_fn};
    use crate::notification::ChannelNotifier;
    use crate::record::{RecordId, ResourceRecord};
    use serde_json::json;

    fn engine() -> (MutationEngine, tokio::sync::mpsc::Receiver<crate::Notification>) {
        let (notifier, receiver) = ChannelNotifier::new(16);
        let engine = MutationEngine::builder()
            .config(EngineConfig::test())
            .notifier(Arc::new(notifier))
            .build()
            .unwrap();
        (engine, receiver)
    }

    fn limit(id: i64, active: bool) -> ResourceRecord {
        ResourceRecord::new()
            .with_id(&RecordId::Num(id))
            .with("name", format!("limit-{id}"))
            .with("active", active)
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = EngineConfig {
            max_attempts: 0,
            ..EngineConfig::default()
        };
        assert!(MutationEngine::builder().config(config).build().is_err());
    }

    #[tokio::test]
    async fn test_update_commits_and_walks_states() {
        let (engine, mut notifications) = engine();
        engine
            .store()
            .set(CacheKey::detail("limits", 5), CacheData::Item(limit(5, true)));

        let descriptor = MutationDescriptor::update(
            "limits",
            5,
            ResourceRecord::new().with("active", false),
            remote_fn(|payload: ResourceRecord| async move { Ok(Some(payload)) }),
        );
        let outcome = engine.execute(descriptor).await.unwrap();

        assert_eq!(
            outcome.transitions,
            vec![
                MutationState::Idle,
                MutationState::Cancelling,
                MutationState::Snapshotting,
                MutationState::OptimisticallyApplied,
                MutationState::RemoteInFlight,
                MutationState::Committing,
                MutationState::Settled,
            ]
        );
        assert_eq!(outcome.id, Some(RecordId::Num(5)));
        let entry = engine.store().get(&CacheKey::detail("limits", 5)).unwrap();
        assert!(entry.stale);
        assert_eq!(entry.data.as_item().unwrap().get("active"), Some(&json!(false)));
        assert_eq!(
            notifications.recv().await.unwrap().message,
            "Limit updated successfully"
        );
        assert!(!engine.is_busy("limits"));
    }

    #[tokio::test]
    async fn test_permission_failure_rolls_back() {
        let (engine, mut notifications) = engine();
        engine
            .store()
            .set(CacheKey::detail("limits", 5), CacheData::Item(limit(5, true)));
        let before = engine.store().entries();

        let descriptor = MutationDescriptor::update(
            "limits",
            5,
            ResourceRecord::new().with("active", false),
            remote_fn(|_| async { Err(RemoteError::permission("not an admin")) }),
        );
        let err = engine.execute(descriptor).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Mutation(MutationError::Rejected {
                kind: ErrorKind::Permission,
                attempts: 1,
                ..
            })
        ));
        assert_eq!(engine.store().entries(), before);
        let notification = notifications.recv().await.unwrap();
        assert!(!notification.success);
        assert_eq!(notification.message, "Access denied: not an admin");
        assert_eq!(engine.metrics().failure_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_descriptor_settles_once() {
        let (engine, mut notifications) = engine();
        let descriptor = MutationDescriptor::new(
            MutationKind::Delete,
            "limits",
            None,
            ResourceRecord::new(),
            remote_fn(|_| async { Ok(None) }),
        );

        let err = engine.execute(descriptor).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Mutation(MutationError::MissingTarget { .. })
        ));
        assert!(!notifications.recv().await.unwrap().success);
        assert!(notifications.try_recv().is_err());
        let recorded = engine.metrics().recent(1);
        assert_eq!(recorded[0].attempts, 0);
        assert!(!recorded[0].success);
    }

    #[tokio::test]
    async fn test_create_assigns_distinct_temp_ids() {
        let (engine, _notifications) = engine();
        let mut temp_ids = Vec::new();
        for n in 0..3 {
            let descriptor = MutationDescriptor::create(
                "tasks",
                ResourceRecord::new().with("name", format!("task-{n}")),
                remote_fn(move |payload: ResourceRecord| async move {
                    Ok(Some(payload.with_id(&RecordId::Num(100 + n))))
                }),
            );
            let outcome = engine.execute(descriptor).await.unwrap();
            assert_eq!(outcome.id, Some(RecordId::Num(100 + n)));
            temp_ids.push(outcome.temp_id.unwrap());
        }

        temp_ids.dedup();
        assert_eq!(temp_ids.len(), 3);
        assert!(temp_ids.iter().all(RecordId::is_temporary));
    }
}
