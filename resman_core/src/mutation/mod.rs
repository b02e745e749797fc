//! Optimistic mutations
//!
//! A [`MutationDescriptor`] bundles everything one invocation needs: the
//! operation kind, the target resource, the payload, an optional custom
//! optimistic transform and the remote operation. The
//! [`MutationEngine`](engine::MutationEngine) runs it through the
//! coordinator's state machine.

use crate::cache::{CacheKey, CacheStore, KeySelector};
use crate::error::MutationError;
use crate::record::{RecordId, ResourceRecord};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod coordinator;
pub mod engine;
pub mod queue;
pub mod remote;
pub mod transforms;

pub use coordinator::{MutationOutcome, MutationState};
pub use engine::{MutationEngine, MutationEngineBuilder};
pub use queue::{LanePermit, MutationQueue};
pub use remote::{RemoteFn, RemoteOperation, remote_fn};

/// Boolean field flipped by toggle mutations unless another is named
pub const DEFAULT_TOGGLE_FIELD: &str = "active";

/// Kind of mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
    Toggle,
}

impl MutationKind {
    /// Past-tense verb used in notifications
    pub fn past_tense(self) -> &'static str {
        match self {
            Self::Create => "created",
            Self::Update => "updated",
            Self::Delete => "deleted",
            Self::Toggle => "toggled",
        }
    }

    /// Whether the mutation addresses an existing record
    pub fn requires_target(self) -> bool {
        !matches!(self, Self::Create)
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Toggle => "toggle",
        };
        f.write_str(name)
    }
}

/// What an optimistic transform sees
#[derive(Debug, Clone, PartialEq)]
pub struct TransformContext {
    pub kind: MutationKind,
    pub resource_type: String,
    /// Record the mutation addresses; the temporary id for creates
    pub target: Option<RecordId>,
    /// Payload with `target` written into its id field
    pub payload: ResourceRecord,
}

/// A synchronous speculative write against the cache
pub type OptimisticTransform = Box<dyn Fn(&CacheStore, &TransformContext) + Send + Sync>;

/// Caller-supplied bundle describing one mutation
pub struct MutationDescriptor {
    pub(crate) kind: MutationKind,
    pub(crate) resource_type: String,
    pub(crate) target: Option<RecordId>,
    pub(crate) payload: ResourceRecord,
    pub(crate) transform: Option<OptimisticTransform>,
    pub(crate) remote: Box<dyn RemoteOperation>,
    pub(crate) touches: Vec<KeySelector>,
    pub(crate) affected_scopes: Vec<CacheKey>,
    pub(crate) success_message: Option<String>,
    pub(crate) failure_message: Option<String>,
}

impl MutationDescriptor {
    pub fn new<R>(
        kind: MutationKind,
        resource_type: &str,
        target: Option<RecordId>,
        payload: ResourceRecord,
        remote: R,
    ) -> Self
    where
        R: RemoteOperation + 'static,
    {
        Self {
            kind,
            resource_type: resource_type.to_string(),
            target,
            payload,
            transform: None,
            remote: Box::new(remote),
            touches: Vec::new(),
            affected_scopes: Vec::new(),
            success_message: None,
            failure_message: None,
        }
    }

    /// Create a record; the engine assigns a temporary id
    pub fn create<R>(resource_type: &str, payload: ResourceRecord, remote: R) -> Self
    where
        R: RemoteOperation + 'static,
    {
        Self::new(MutationKind::Create, resource_type, None, payload, remote)
    }

    /// Shallow-merge `patch` into record `id`
    pub fn update<R>(
        resource_type: &str,
        id: impl Into<RecordId>,
        patch: ResourceRecord,
        remote: R,
    ) -> Self
    where
        R: RemoteOperation + 'static,
    {
        Self::new(
            MutationKind::Update,
            resource_type,
            Some(id.into()),
            patch,
            remote,
        )
    }

    /// Delete record `id`
    pub fn delete<R>(resource_type: &str, id: impl Into<RecordId>, remote: R) -> Self
    where
        R: RemoteOperation + 'static,
    {
        Self::new(
            MutationKind::Delete,
            resource_type,
            Some(id.into()),
            ResourceRecord::new(),
            remote,
        )
    }

    /// Set boolean `field` of record `id` to `enabled`
    pub fn toggle<R>(
        resource_type: &str,
        id: impl Into<RecordId>,
        field: &str,
        enabled: bool,
        remote: R,
    ) -> Self
    where
        R: RemoteOperation + 'static,
    {
        Self::new(
            MutationKind::Toggle,
            resource_type,
            Some(id.into()),
            ResourceRecord::new().with(field, enabled),
            remote,
        )
    }

    /// Replace the built-in optimistic transform
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&CacheStore, &TransformContext) + Send + Sync + 'static,
    {
        self.transform = Some(Box::new(transform));
        self
    }

    /// Declare extra keys the transform writes, so they are snapshotted
    pub fn touching(mut self, selector: KeySelector) -> Self {
        self.touches.push(selector);
        self
    }

    /// Invalidate `prefix` in addition to the planned targets
    pub fn with_scope(mut self, prefix: CacheKey) -> Self {
        self.affected_scopes.push(prefix);
        self
    }

    pub fn with_success_message(mut self, message: impl Into<String>) -> Self {
        self.success_message = Some(message.into());
        self
    }

    pub fn with_failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = Some(message.into());
        self
    }

    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn target(&self) -> Option<&RecordId> {
        self.target.as_ref()
    }

    pub fn payload(&self) -> &ResourceRecord {
        &self.payload
    }

    /// `"<resource_type>.<kind>"`
    pub fn operation(&self) -> String {
        format!("{}.{}", self.resource_type, self.kind)
    }

    /// Check the descriptor is complete
    pub fn validate(&self) -> Result<(), MutationError> {
        if self.resource_type.trim().is_empty() {
            return Err(MutationError::EmptyResourceType);
        }
        if self.kind.requires_target() && self.target.is_none() {
            return Err(MutationError::missing_target(
                self.kind,
                &self.resource_type,
            ));
        }
        Ok(())
    }

    /// Every key selector the optimistic write may touch
    pub(crate) fn touched_selectors(&self) -> Vec<KeySelector> {
        let mut selectors = vec![KeySelector::prefix(CacheKey::list_prefix(
            &self.resource_type,
        ))];
        if let Some(id) = &self.target {
            selectors.push(KeySelector::exact(CacheKey::detail(
                &self.resource_type,
                id.clone(),
            )));
        }
        for selector in &self.touches {
            if !selectors.contains(selector) {
                selectors.push(selector.clone());
            }
        }
        selectors
    }
}

impl fmt::Debug for MutationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationDescriptor")
            .field("kind", &self.kind)
            .field("resource_type", &self.resource_type)
            .field("target", &self.target)
            .field("payload", &self.payload)
            .field("custom_transform", &self.transform.is_some())
            .field("touches", &self.touches)
            .field("affected_scopes", &self.affected_scopes)
            .finish()
    }
}
