//! Catalog of resource kinds managed by the console
//!
//! Each kind carries a display label for notifications and the resource types
//! whose views embed it, which must be invalidated when it changes.

use serde::Serialize;
use std::collections::BTreeMap;

/// One kind of managed resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceKind {
    /// Resource type used as the first cache key segment
    pub name: String,
    /// Singular display label
    pub label: String,
    /// Resource types whose views embed this one
    pub embedded_in: Vec<String>,
}

impl ResourceKind {
    /// Create a kind with no relations
    pub fn new(name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            embedded_in: Vec::new(),
        }
    }

    /// Declare that views of `resource_type` embed this kind
    pub fn embedded_in(mut self, resource_type: &str) -> Self {
        self.embedded_in.push(resource_type.to_string());
        self
    }
}

/// Registry of resource kinds
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResourceCatalog {
    kinds: BTreeMap<String, ResourceKind>,
}

impl ResourceCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// The console's built-in resource kinds
    pub fn console() -> Self {
        Self::new()
            .with(ResourceKind::new("limits", "Limit"))
            .with(ResourceKind::new("tasks", "Scheduler task"))
            .with(
                ResourceKind::new("services", "Service")
                    .embedded_in("limits")
                    .embedded_in("tasks")
                    .embedded_in("caches"),
            )
            .with(ResourceKind::new("caches", "Cache").embedded_in("services"))
            .with(ResourceKind::new("users", "User"))
    }

    /// Register a kind, replacing any kind with the same name
    pub fn with(mut self, kind: ResourceKind) -> Self {
        self.kinds.insert(kind.name.clone(), kind);
        self
    }

    /// Look up a kind
    pub fn get(&self, resource_type: &str) -> Option<&ResourceKind> {
        self.kinds.get(resource_type)
    }

    /// Display label, falling back to the resource type itself
    pub fn label(&self, resource_type: &str) -> String {
        self.get(resource_type)
            .map(|kind| kind.label.clone())
            .unwrap_or_else(|| resource_type.to_string())
    }

    /// Resource types whose views embed `resource_type`
    pub fn related(&self, resource_type: &str) -> &[String] {
        self.get(resource_type)
            .map(|kind| kind.embedded_in.as_slice())
            .unwrap_or_default()
    }

    /// All kinds in name order
    pub fn kinds(&self) -> impl Iterator<Item = &ResourceKind> {
        self.kinds.values()
    }
}
