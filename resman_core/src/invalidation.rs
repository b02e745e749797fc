//! Invalidation planning
//!
//! After a mutation commits, the planner computes which cache keys must be
//! marked stale so the UI data-fetching layer refetches them. Planning is a
//! pure function of its inputs.

use crate::cache::{CacheKey, KeySelector};
use crate::catalog::ResourceCatalog;
use crate::record::RecordId;
use std::collections::BTreeMap;

/// The unit emitted by the planner: a key or a key prefix to mark stale
pub type InvalidationTarget = KeySelector;

/// Computes invalidation targets for mutated resources
#[derive(Debug, Clone, Default)]
pub struct InvalidationPlanner {
    related: BTreeMap<String, Vec<CacheKey>>,
}

impl InvalidationPlanner {
    /// Create a planner with no related prefixes
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a planner from the relations declared in `catalog`
    pub fn from_catalog(catalog: &ResourceCatalog) -> Self {
        catalog.kinds().fold(Self::new(), |planner, kind| {
            kind.embedded_in.iter().fold(planner, |planner, other| {
                planner.with_related(&kind.name, CacheKey::resource(other))
            })
        })
    }

    /// Declare a related prefix to invalidate whenever `resource_type` changes
    pub fn with_related(mut self, resource_type: &str, prefix: CacheKey) -> Self {
        self.related
            .entry(resource_type.to_string())
            .or_default()
            .push(prefix);
        self
    }

    /// Related prefixes declared for `resource_type`
    pub fn related(&self, resource_type: &str) -> &[CacheKey] {
        self.related
            .get(resource_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Plan the targets for a mutation of `resource_type` / `id`
    ///
    /// Always includes the exact detail key for `id` (when known) and the
    /// list prefix for `resource_type`, then declared related prefixes, then
    /// `affected_scopes`. Duplicates are dropped; order is stable.
    pub fn plan(
        &self,
        resource_type: &str,
        id: Option<&RecordId>,
        affected_scopes: &[CacheKey],
    ) -> Vec<InvalidationTarget> {
        let mut targets = Vec::new();
        if let Some(id) = id {
            targets.push(KeySelector::exact(CacheKey::detail(resource_type, id.clone())));
        }
        targets.push(KeySelector::prefix(CacheKey::list_prefix(resource_type)));

        let extra = self
            .related(resource_type)
            .iter()
            .chain(affected_scopes)
            .map(|prefix| KeySelector::prefix(prefix.clone()));
        for target in extra {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        targets
    }
}
