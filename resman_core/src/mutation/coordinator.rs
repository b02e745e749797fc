//! Mutation lifecycle state machine
//!
//! One [`MutationCoordinator`] drives one descriptor through
//! `Idle → Cancelling → Snapshotting → OptimisticallyApplied → RemoteInFlight
//! → {Committing | RollingBack} → Settled`. The remote call is the only
//! suspension point apart from the lane wait before `Cancelling` and the
//! backoff sleep after a rollback. Every path ends in `Settled` with exactly
//! one metrics record and one notification.
//!
//! Dropping the `execute` future at any of those suspension points drops the
//! remote call with it. The coordinator then restores the pending snapshot
//! and settles as [`MutationError::Cancelled`] before its lane permit is
//! released.

use super::engine::MutationEngine;
use super::queue::LanePermit;
use super::transforms;
use super::{MutationDescriptor, MutationKind, TransformContext};
use crate::cache::CacheStore;
use crate::error::{ErrorKind, MutationError, RemoteError};
use crate::invalidation::InvalidationTarget;
use crate::metrics::MutationMetrics;
use crate::notification::Notification;
use crate::record::{RecordId, ResourceRecord};
use crate::retry::RetryDecision;
use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::mem;
use std::time::Instant;

/// Lifecycle states of one mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationState {
    Idle,
    Cancelling,
    Snapshotting,
    OptimisticallyApplied,
    RemoteInFlight,
    Committing,
    RollingBack,
    Settled,
}

impl fmt::Display for MutationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Cancelling => "Cancelling",
            Self::Snapshotting => "Snapshotting",
            Self::OptimisticallyApplied => "OptimisticallyApplied",
            Self::RemoteInFlight => "RemoteInFlight",
            Self::Committing => "Committing",
            Self::RollingBack => "RollingBack",
            Self::Settled => "Settled",
        };
        f.write_str(name)
    }
}

/// Result of a committed mutation
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    /// Authoritative id of the mutated record, when known
    pub id: Option<RecordId>,
    /// Record returned by the server
    pub record: Option<ResourceRecord>,
    /// Temporary id used while a create was in flight
    pub temp_id: Option<RecordId>,
    /// Remote attempts made, including the successful one
    pub attempts: u32,
    /// Targets marked stale after the commit
    pub invalidated: Vec<InvalidationTarget>,
    pub metrics: MutationMetrics,
    /// Every state entered, in order
    pub transitions: Vec<MutationState>,
}

/// Drives a single descriptor to `Settled`
pub(crate) struct MutationCoordinator<'a> {
    engine: &'a MutationEngine,
    descriptor: MutationDescriptor,
    operation: String,
    state: MutationState,
    transitions: Vec<MutationState>,
    attempts: u32,
    /// Snapshot of the attempt whose optimistic write is still in the cache
    pending: Option<Snapshot>,
    /// Released after `Drop::drop` so a rollback happens inside the lane
    permit: Option<LanePermit>,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl<'a> MutationCoordinator<'a> {
    pub(crate) fn new(engine: &'a MutationEngine, descriptor: MutationDescriptor) -> Self {
        Self {
            engine,
            operation: descriptor.operation(),
            descriptor,
            state: MutationState::Idle,
            transitions: vec![MutationState::Idle],
            attempts: 0,
            pending: None,
            permit: None,
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    fn transition(&mut self, next: MutationState) {
        debug!("{}: {} -> {}", self.operation, self.state, next);
        self.state = next;
        self.transitions.push(next);
    }

    pub(crate) async fn run(mut self) -> Result<MutationOutcome, MutationError> {
        if let Err(err) = self.descriptor.validate() {
            error!("{}: rejected descriptor: {err}", self.operation);
            self.transition(MutationState::Settled);
            self.settle_failure(&err, 0);
            return Err(err);
        }

        let engine = self.engine;
        let store: &CacheStore = &engine.store;
        let kind = self.descriptor.kind;
        let temp_id = (kind == MutationKind::Create).then(|| engine.temp_ids.next_id());
        if let Some(temp_id) = &temp_id {
            self.descriptor.target = Some(temp_id.clone());
        }
        let target = self.descriptor.target.clone();

        let selectors = self.descriptor.touched_selectors();
        let lanes: BTreeSet<String> = selectors
            .iter()
            .filter_map(|selector| selector.key.resource_type())
            .map(str::to_string)
            .collect();
        self.permit = Some(engine.queue.acquire(&lanes).await);

        self.transition(MutationState::Cancelling);
        let cancelled = store.cancel_reads(&selectors);
        if cancelled > 0 {
            debug!("{}: cancelled {cancelled} in-flight read(s)", self.operation);
        }

        let context = TransformContext {
            kind,
            resource_type: self.descriptor.resource_type.clone(),
            target: target.clone(),
            payload: match &target {
                Some(id) => self.descriptor.payload.clone().with_id(id),
                None => self.descriptor.payload.clone(),
            },
        };
        let remote_payload = match (&target, kind) {
            (Some(id), MutationKind::Update | MutationKind::Delete | MutationKind::Toggle) => {
                self.descriptor.payload.clone().with_id(id)
            }
            _ => self.descriptor.payload.clone(),
        };
        let cached = match (&target, kind) {
            (Some(id), MutationKind::Delete) => {
                transforms::is_cached(store, &self.descriptor.resource_type, id)
            }
            _ => true,
        };

        loop {
            self.attempts += 1;
            let attempts = self.attempts;
            self.transition(MutationState::Snapshotting);
            self.pending = Some(engine.snapshots.capture_selectors(&selectors));

            self.transition(MutationState::OptimisticallyApplied);
            match &self.descriptor.transform {
                Some(transform) => transform(store, &context),
                None => transforms::apply_builtin(store, &context),
            }

            self.transition(MutationState::RemoteInFlight);
            let mut gone_remotely = false;
            let result = match self.descriptor.remote.call(&remote_payload).await {
                Err(err) if kind == MutationKind::Delete && err.is_not_found() => {
                    debug!("{}: record already gone remotely", self.operation);
                    gone_remotely = true;
                    Ok(None)
                }
                other => other,
            };

            match result {
                Ok(server) => {
                    self.pending = None;
                    self.transition(MutationState::Committing);
                    let id = transforms::reconcile(
                        store,
                        kind,
                        &self.descriptor.resource_type,
                        target.as_ref(),
                        server.as_ref(),
                    );
                    // Nothing was removed locally or remotely
                    let invalidated = if gone_remotely && !cached {
                        debug!("{}: nothing removed, skipping invalidation", self.operation);
                        Vec::new()
                    } else {
                        engine.planner.plan(
                            &self.descriptor.resource_type,
                            id.as_ref(),
                            &self.descriptor.affected_scopes,
                        )
                    };
                    for selector in &invalidated {
                        store.mark_stale(selector);
                    }

                    self.transition(MutationState::Settled);
                    let metrics = self.settle_success(attempts);
                    return Ok(MutationOutcome {
                        id,
                        record: server,
                        temp_id,
                        attempts,
                        invalidated,
                        metrics,
                        transitions: mem::take(&mut self.transitions),
                    });
                }
                Err(err) => {
                    self.transition(MutationState::RollingBack);
                    warn!(
                        "{}: attempt {attempts} failed ({err}), rolling back",
                        self.operation
                    );
                    if let Some(snapshot) = self.pending.take() {
                        engine.snapshots.restore(snapshot);
                    }

                    match engine.retry.evaluate(&err, attempts) {
                        RetryDecision::Retry { attempt, delay } => {
                            warn!(
                                "{}: retrying in {}ms (attempt {attempt}/{})",
                                self.operation,
                                delay.as_millis(),
                                engine.retry.max_attempts()
                            );
                            tokio::time::sleep(delay).await;
                        }
                        RetryDecision::GiveUp { .. } => {
                            let err = MutationError::rejected(attempts, err);
                            error!("{}: {err}", self.operation);
                            self.transition(MutationState::Settled);
                            self.settle_failure(&err, attempts);
                            return Err(err);
                        }
                    }
                }
            }
        }
    }

    /// Roll back and settle a run whose future was dropped mid-flight
    fn settle_cancelled(&mut self) {
        let phase = self.state;
        if let Some(snapshot) = self.pending.take() {
            self.engine.snapshots.restore(snapshot);
        }
        let err = MutationError::Cancelled {
            attempts: self.attempts,
        };
        warn!("{}: cancelled during {phase}, cache restored", self.operation);
        self.transition(MutationState::Settled);
        self.settle_failure(&err, self.attempts);
    }

    fn metrics(&self, attempts: u32, error_kind: Option<ErrorKind>, success: bool) -> MutationMetrics {
        let elapsed = self.started.elapsed();
        MutationMetrics {
            operation: self.operation.clone(),
            kind: self.descriptor.kind,
            resource_type: self.descriptor.resource_type.clone(),
            started_at: self.started_at,
            ended_at: Utc::now(),
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            attempts,
            success,
            error_kind,
        }
    }

    fn settle_success(&self, attempts: u32) -> MutationMetrics {
        let metrics = self.metrics(attempts, None, true);
        self.engine.metrics.record(metrics.clone());

        let message = self
            .descriptor
            .success_message
            .clone()
            .unwrap_or_else(|| {
                format!(
                    "{} {} successfully",
                    self.label(),
                    self.descriptor.kind.past_tense()
                )
            });
        info!("{}: {message}", self.operation);
        self.engine.notifier.notify(Notification::success(message));
        metrics
    }

    fn settle_failure(&self, err: &MutationError, attempts: u32) {
        self.engine
            .metrics
            .record(self.metrics(attempts, err.kind(), false));

        let message = self
            .descriptor
            .failure_message
            .clone()
            .unwrap_or_else(|| self.failure_message(err));
        self.engine.notifier.notify(Notification::failure(message));
    }

    fn label(&self) -> String {
        self.engine.catalog.label(&self.descriptor.resource_type)
    }

    fn failure_message(&self, err: &MutationError) -> String {
        let action = format!(
            "Failed to {} {}",
            self.descriptor.kind,
            self.label().to_lowercase()
        );
        match err {
            MutationError::Rejected { kind, source, .. } => match kind {
                ErrorKind::Validation => validation_message(source),
                ErrorKind::Permission => format!("Access denied: {}", source.message),
                ErrorKind::Conflict => format!(
                    "{} conflicts with an existing resource: {}",
                    self.label(),
                    source.message
                ),
                ErrorKind::Transient | ErrorKind::Unknown => {
                    format!("{action}: {}", source.message)
                }
            },
            other => format!("{action}: {other}"),
        }
    }
}

impl Drop for MutationCoordinator<'_> {
    fn drop(&mut self) {
        if self.state != MutationState::Settled {
            self.settle_cancelled();
        }
    }
}

fn validation_message(source: &RemoteError) -> String {
    if source.field_errors.is_empty() {
        return format!("Validation failed: {}", source.message);
    }
    let fields: Vec<String> = source.field_errors.iter().map(ToString::to_string).collect();
    format!("Validation failed: {} ({})", source.message, fields.join("; "))
}
