//! Per-mutation metrics
//!
//! The recorder is append-only and purely informational: the coordinator
//! writes one [`MutationMetrics`] per settled mutation and never reads them.

use crate::error::ErrorKind;
use crate::mutation::MutationKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Default number of recent records kept
pub const DEFAULT_METRICS_CAPACITY: usize = 100;

/// Timing and outcome of one settled mutation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutationMetrics {
    /// `"<resource_type>.<kind>"`, e.g. `"limits.create"`
    pub operation: String,
    pub kind: MutationKind,
    pub resource_type: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Remote attempts made, including the successful one
    pub attempts: u32,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl MutationMetrics {
    /// Elapsed wall time
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Aggregate view of recorded metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub total: u64,
    pub failures: u64,
    pub retained: usize,
    pub average_duration_ms: Option<u64>,
    pub max_duration_ms: Option<u64>,
    pub slow_operations: usize,
}

/// Bounded ring of recent mutation metrics plus running totals
#[derive(Debug)]
pub struct MetricsRecorder {
    recent: Mutex<VecDeque<MutationMetrics>>,
    capacity: usize,
    slow_threshold: Duration,
    total: AtomicU64,
    failures: AtomicU64,
}

impl MetricsRecorder {
    /// Create a recorder keeping the last `capacity` records
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            recent: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            slow_threshold: Duration::from_secs(1),
            total: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Set the threshold used by [`summary`](Self::summary)
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<MutationMetrics>> {
        self.recent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one record, evicting the oldest when full
    pub fn record(&self, metrics: MutationMetrics) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if !metrics.success {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        let mut recent = self.lock();
        if recent.len() == self.capacity {
            recent.pop_front();
        }
        recent.push_back(metrics);
    }

    /// The last `n` records, oldest first
    pub fn recent(&self, n: usize) -> Vec<MutationMetrics> {
        let recent = self.lock();
        let skip = recent.len().saturating_sub(n);
        recent.iter().skip(skip).cloned().collect()
    }

    /// Every retained record, oldest first
    pub fn all(&self) -> Vec<MutationMetrics> {
        self.lock().iter().cloned().collect()
    }

    /// Total records ever written
    pub fn count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Total failed mutations ever recorded
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Retained records that took at least `threshold`
    pub fn slow_operations(&self, threshold: Duration) -> Vec<MutationMetrics> {
        self.lock()
            .iter()
            .filter(|m| m.duration() >= threshold)
            .cloned()
            .collect()
    }

    /// Summarize the retained records
    pub fn summary(&self) -> MetricsSummary {
        let recent = self.lock();
        let durations: Vec<u64> = recent.iter().map(|m| m.duration_ms).collect();
        let average_duration_ms = (!durations.is_empty())
            .then(|| durations.iter().sum::<u64>() / durations.len() as u64);
        MetricsSummary {
            total: self.count(),
            failures: self.failure_count(),
            retained: recent.len(),
            average_duration_ms,
            max_duration_ms: durations.iter().copied().max(),
            slow_operations: recent
                .iter()
                .filter(|m| m.duration() >= self.slow_threshold)
                .count(),
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_METRICS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(duration_ms: u64, success: bool) -> MutationMetrics {
        let started_at = Utc::now();
        MutationMetrics {
            operation: "limits.update".to_string(),
            kind: MutationKind::Update,
            resource_type: "limits".to_string(),
            started_at,
            ended_at: started_at + chrono::Duration::milliseconds(duration_ms as i64),
            duration_ms,
            attempts: 1,
            success,
            error_kind: (!success).then_some(ErrorKind::Transient),
        }
    }

    #[test]
    fn test_ring_is_bounded() {
        let recorder = MetricsRecorder::with_capacity(3);
        for i in 0..5 {
            recorder.record(metrics(i, true));
        }

        assert_eq!(recorder.count(), 5);
        let durations: Vec<_> = recorder.all().iter().map(|m| m.duration_ms).collect();
        assert_eq!(durations, vec![2, 3, 4]);
        let last: Vec<_> = recorder.recent(2).iter().map(|m| m.duration_ms).collect();
        assert_eq!(last, vec![3, 4]);
        assert_eq!(recorder.recent(10).len(), 3);
    }

    #[test]
    fn test_failures_counted() {
        let recorder = MetricsRecorder::default();
        recorder.record(metrics(10, true));
        recorder.record(metrics(10, false));

        assert_eq!(recorder.count(), 2);
        assert_eq!(recorder.failure_count(), 1);
    }

    #[test]
    fn test_slow_operations() {
        let recorder = MetricsRecorder::default();
        recorder.record(metrics(50, true));
        recorder.record(metrics(1500, true));
        recorder.record(metrics(2500, false));

        let slow = recorder.slow_operations(Duration::from_secs(1));
        assert_eq!(slow.len(), 2);
        assert!(slow.iter().all(|m| m.duration_ms >= 1000));
    }

    #[test]
    fn test_summary() {
        let recorder =
            MetricsRecorder::with_capacity(10).with_slow_threshold(Duration::from_millis(100));
        assert_eq!(recorder.summary(), MetricsSummary::default());

        recorder.record(metrics(50, true));
        recorder.record(metrics(250, false));

        let summary = recorder.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.retained, 2);
        assert_eq!(summary.average_duration_ms, Some(150));
        assert_eq!(summary.max_duration_ms, Some(250));
        assert_eq!(summary.slow_operations, 1);
    }

    #[test]
    fn test_serialize_skips_missing_error_kind() {
        let json = serde_json::to_value(metrics(5, true)).unwrap();
        assert_eq!(json["operation"], "limits.update");
        assert_eq!(json["kind"], "update");
        assert!(json.get("error_kind").is_none());
    }
}
