//! Builders for records and seeded cache stores

use resman_core::{CacheData, CacheKey, CacheStore, RecordId, ResourceRecord};
use std::sync::Arc;

/// A rate limit record
pub fn limit(id: i64, name: &str) -> ResourceRecord {
    ResourceRecord::new()
        .with_id(&RecordId::Num(id))
        .with("name", name)
        .with("max_requests", 100)
        .with("active", true)
}

/// A scheduler task record with a string id
pub fn task(id: &str, cron: &str) -> ResourceRecord {
    ResourceRecord::new()
        .with_id(&RecordId::Str(id.to_string()))
        .with("cron", cron)
        .with("active", true)
}

/// Builder for a cache store seeded with list and detail entries
#[derive(Default)]
pub struct StoreBuilder {
    entries: Vec<(CacheKey, CacheData)>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an unfiltered list and a detail entry per record
    pub fn resource(self, resource_type: &str, records: Vec<ResourceRecord>) -> Self {
        let with_list = self.list(resource_type, &[], records.clone());
        records
            .into_iter()
            .fold(with_list, |builder, record| builder.detail(resource_type, record))
    }

    /// Seed a list view filtered by `params`
    pub fn list(
        mut self,
        resource_type: &str,
        params: &[(&str, &str)],
        records: Vec<ResourceRecord>,
    ) -> Self {
        self.entries.push((
            CacheKey::list(resource_type, params.iter().copied()),
            CacheData::List(records),
        ));
        self
    }

    /// Seed a detail entry keyed by the record's id
    pub fn detail(mut self, resource_type: &str, record: ResourceRecord) -> Self {
        if let Some(id) = record.id() {
            self.entries
                .push((CacheKey::detail(resource_type, id), CacheData::Item(record)));
        }
        self
    }

    pub fn build(self) -> Arc<CacheStore> {
        let store = Arc::new(CacheStore::new());
        for (key, data) in self.entries {
            store.set(key, data);
        }
        store
    }
}
