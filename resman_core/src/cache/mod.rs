//! Cache store for server-resource snapshots
//!
//! Entries are keyed by [`CacheKey`], an ordered tuple of segments such as
//! `["limits", "list", {status: "active"}]` or `["limits", "detail", 42]`.
//! Keys form a prefix hierarchy, so every list view of a resource type can be
//! addressed through the `[type, "list"]` prefix.

use crate::record::{RecordId, ResourceRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub mod reads;
pub mod store;

pub use reads::ReadTicket;
pub use store::{CacheEvent, CacheStats, CacheStore};

const LIST_SEGMENT: &str = "list";
const DETAIL_SEGMENT: &str = "detail";

/// One segment of a cache key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum KeySegment {
    /// A literal name such as a resource type or view kind
    Text(String),
    /// A record identifier
    Id(RecordId),
    /// Filter parameters of a list view
    Params(BTreeMap<String, String>),
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text:?}"),
            Self::Id(RecordId::Num(n)) => write!(f, "{n}"),
            Self::Id(id) => write!(f, "{:?}", id.to_string()),
            Self::Params(params) => {
                f.write_str("{")?;
                for (i, (name, value)) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{name}:{value:?}")?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Structurally comparable key identifying a cached view
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CacheKey(Vec<KeySegment>);

impl CacheKey {
    /// Create a key from raw segments
    pub fn new(segments: Vec<KeySegment>) -> Self {
        Self(segments)
    }

    /// Prefix covering every key of a resource type
    pub fn resource(resource_type: &str) -> Self {
        Self(vec![KeySegment::Text(resource_type.to_string())])
    }

    /// Prefix covering every list view of a resource type
    pub fn list_prefix(resource_type: &str) -> Self {
        Self(vec![
            KeySegment::Text(resource_type.to_string()),
            KeySegment::Text(LIST_SEGMENT.to_string()),
        ])
    }

    /// A list view filtered by `params`
    pub fn list<I, K, V>(resource_type: &str, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let params = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let mut key = Self::list_prefix(resource_type);
        key.0.push(KeySegment::Params(params));
        key
    }

    /// The detail view of one record
    pub fn detail(resource_type: &str, id: impl Into<RecordId>) -> Self {
        Self(vec![
            KeySegment::Text(resource_type.to_string()),
            KeySegment::Text(DETAIL_SEGMENT.to_string()),
            KeySegment::Id(id.into()),
        ])
    }

    /// Segments of this key
    pub fn segments(&self) -> &[KeySegment] {
        &self.0
    }

    /// Resource type named by the first segment
    pub fn resource_type(&self) -> Option<&str> {
        match self.0.first() {
            Some(KeySegment::Text(name)) => Some(name),
            _ => None,
        }
    }

    /// Whether `prefix` is a (non-strict) prefix of this key
    pub fn starts_with(&self, prefix: &CacheKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Whether this key addresses a list view (or the list prefix)
    pub fn is_list(&self) -> bool {
        matches!(self.0.get(1), Some(KeySegment::Text(s)) if s == LIST_SEGMENT)
    }

    /// Whether this key addresses a detail view
    pub fn is_detail(&self) -> bool {
        matches!(self.0.get(1), Some(KeySegment::Text(s)) if s == DETAIL_SEGMENT)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{segment}")?;
        }
        f.write_str("]")
    }
}

/// Data held by a cache entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CacheData {
    /// Detail view of one record
    Item(ResourceRecord),
    /// List view
    List(Vec<ResourceRecord>),
}

impl CacheData {
    /// The record of a detail view
    pub fn as_item(&self) -> Option<&ResourceRecord> {
        match self {
            Self::Item(record) => Some(record),
            Self::List(_) => None,
        }
    }

    /// The records of a list view
    pub fn as_list(&self) -> Option<&[ResourceRecord]> {
        match self {
            Self::List(records) => Some(records),
            Self::Item(_) => None,
        }
    }

    /// Whether any record in this data carries `id`
    pub fn contains_id(&self, id: &RecordId) -> bool {
        match self {
            Self::Item(record) => record.has_id(id),
            Self::List(records) => records.iter().any(|r| r.has_id(id)),
        }
    }
}

/// One stored view of server-resource data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub data: CacheData,
    pub fetched_at: DateTime<Utc>,
    pub stale: bool,
}

/// How a [`KeySelector`] matches keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyScope {
    /// Exactly one key
    Exact,
    /// Every key starting with the selector key
    Prefix,
}

/// A key or key prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct KeySelector {
    pub scope: KeyScope,
    pub key: CacheKey,
}

impl KeySelector {
    /// Select exactly `key`
    pub fn exact(key: CacheKey) -> Self {
        Self {
            scope: KeyScope::Exact,
            key,
        }
    }

    /// Select every key under `prefix`
    pub fn prefix(prefix: CacheKey) -> Self {
        Self {
            scope: KeyScope::Prefix,
            key: prefix,
        }
    }

    /// Whether `key` falls under this selector
    pub fn matches(&self, key: &CacheKey) -> bool {
        match self.scope {
            KeyScope::Exact => key == &self.key,
            KeyScope::Prefix => key.starts_with(&self.key),
        }
    }
}

impl fmt::Display for KeySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            KeyScope::Exact => write!(f, "{}", self.key),
            KeyScope::Prefix => write!(f, "{}*", self.key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_and_detail_are_disjoint() {
        let list = CacheKey::list("limits", [("status", "active")]);
        let detail = CacheKey::detail("limits", 42);

        assert!(list.starts_with(&CacheKey::list_prefix("limits")));
        assert!(!detail.starts_with(&CacheKey::list_prefix("limits")));
        assert!(!list.starts_with(&detail));
        assert!(!detail.starts_with(&list));
        assert!(list.is_list());
        assert!(detail.is_detail());
    }

    #[test]
    fn test_resource_type() {
        assert_eq!(CacheKey::detail("users", 1).resource_type(), Some("users"));
        assert_eq!(CacheKey::new(vec![]).resource_type(), None);
    }

    #[test]
    fn test_display() {
        let key = CacheKey::list("limits", [("status", "active")]);
        assert_eq!(key.to_string(), r#"["limits","list",{status:"active"}]"#);
        assert_eq!(CacheKey::detail("limits", 42).to_string(), r#"["limits","detail",42]"#);
        assert_eq!(
            KeySelector::prefix(CacheKey::list_prefix("limits")).to_string(),
            r#"["limits","list"]*"#
        );
    }

    #[test]
    fn test_selector_matching() {
        let exact = KeySelector::exact(CacheKey::detail("limits", 1));
        let prefix = KeySelector::prefix(CacheKey::resource("limits"));

        assert!(exact.matches(&CacheKey::detail("limits", 1)));
        assert!(!exact.matches(&CacheKey::detail("limits", 2)));
        assert!(prefix.matches(&CacheKey::detail("limits", 2)));
        assert!(prefix.matches(&CacheKey::list("limits", Vec::<(String, String)>::new())));
        assert!(!prefix.matches(&CacheKey::detail("users", 2)));
    }

    #[test]
    fn test_serialize_key() {
        let key = CacheKey::detail("tasks", "nightly");
        assert_eq!(
            serde_json::to_string(&key).unwrap(),
            r#"["tasks","detail","nightly"]"#
        );
    }
}
