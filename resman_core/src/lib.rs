//! Resman Core Library
//!
//! The optimistic mutation and cache-consistency engine behind the resource
//! management console. A user action is applied to a locally held view of
//! server state immediately, then reconciled with (or rolled back to) the
//! true server state once the remote call resolves.
//!
//! Components, leaves first: [`CacheStore`], [`SnapshotManager`],
//! [`InvalidationPlanner`], [`RetryPolicy`], the mutation coordinator run by
//! [`MutationEngine`], and [`MetricsRecorder`].

use serde::{Deserialize, Serialize};

pub mod cache;
pub mod catalog;
pub mod error;
pub mod invalidation;
pub mod metrics;
pub mod mutation;
pub mod notification;
pub mod record;
pub mod retry;
pub mod snapshot;

// Re-export main types
pub use cache::{
    CacheData, CacheEntry, CacheEvent, CacheKey, CacheStats, CacheStore, KeyScope, KeySegment,
    KeySelector, ReadTicket,
};
pub use catalog::{ResourceCatalog, ResourceKind};
pub use error::{ConfigError, Error, ErrorKind, FieldError, MutationError, RemoteError, Result};
pub use invalidation::{InvalidationPlanner, InvalidationTarget};
pub use metrics::{MetricsRecorder, MetricsSummary, MutationMetrics};
pub use mutation::{
    MutationDescriptor, MutationEngine, MutationEngineBuilder, MutationKind, MutationOutcome,
    MutationState, RemoteOperation, TransformContext, remote_fn,
};
pub use notification::{
    ChannelNotifier, LogNotifier, Notification, Notifier, NullNotifier, SharedNotifier,
};
pub use record::{RecordId, ResourceRecord, TempIdGenerator};
pub use retry::{Classification, RetryDecision, RetryPolicy};
pub use snapshot::{Snapshot, SnapshotManager};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Total remote attempts per mutation, including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Number of recent mutation metrics kept
    pub metrics_capacity: usize,
    /// Mutations at least this slow are reported as slow operations
    pub slow_threshold_ms: u64,
    /// Buffer size of the cache change-event channel
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5000,
            metrics_capacity: metrics::DEFAULT_METRICS_CAPACITY,
            slow_threshold_ms: 1000,
            event_capacity: cache::store::DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Create a test configuration
    pub fn test() -> Self {
        Self {
            base_delay_ms: 1, // keep retry tests fast
            max_delay_ms: 10,
            metrics_capacity: 16,
            slow_threshold_ms: 50,
            ..Self::default()
        }
    }

    /// Check every setting is usable
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts", "must be at least 1"));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ConfigError::invalid(
                "base_delay_ms",
                "must not exceed max_delay_ms",
            ));
        }
        if self.metrics_capacity == 0 {
            return Err(ConfigError::invalid(
                "metrics_capacity",
                "must be at least 1",
            ));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::invalid("event_capacity", "must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
        assert!(EngineConfig::test().validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let config = EngineConfig {
            base_delay_ms: 10_000,
            ..EngineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("base_delay_ms"));

        let config = EngineConfig {
            metrics_capacity: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_deserialize_partial() {
        let config: EngineConfig = serde_json::from_str(r#"{"max_attempts": 5}"#).unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay_ms, 200);
    }
}
