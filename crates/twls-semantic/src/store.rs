use std::collections::BTreeSet;
use std::sync::Arc;

use twls_source::FxDashMap;
use twls_source::TemplateId;

use crate::record::TemplateRecord;

/// Concurrent map from template id to its latest record.
///
/// Records are built before they reach the store, so a writer only holds a
/// shard lock long enough to swap an `Arc`. Readers get a cloned `Arc` and
/// keep a consistent record even if it is replaced right after.
#[derive(Debug, Default)]
pub struct IndexStore {
    records: FxDashMap<TemplateId, Arc<TemplateRecord>>,
}

impl IndexStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for `id`, returning the previous one.
    pub fn upsert(&self, id: TemplateId, record: Arc<TemplateRecord>) -> Option<Arc<TemplateRecord>> {
        debug_assert_eq!(&id, record.id(), "record stored under a foreign id");
        self.records.insert(id, record)
    }

    /// Remove `id`. Unknown ids are ignored.
    pub fn remove(&self, id: &TemplateId) -> Option<Arc<TemplateRecord>> {
        self.records.remove(id).map(|(_, record)| record)
    }

    #[must_use]
    pub fn get(&self, id: &TemplateId) -> Option<Arc<TemplateRecord>> {
        self.records.get(id).map(|entry| Arc::clone(entry.value()))
    }

    #[must_use]
    pub fn contains(&self, id: &TemplateId) -> bool {
        self.records.contains_key(id)
    }

    #[must_use]
    pub fn all_ids(&self) -> BTreeSet<TemplateId> {
        self.records.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Every record, ordered by id.
    #[must_use]
    pub fn records(&self) -> Vec<Arc<TemplateRecord>> {
        let mut records: Vec<_> = self
            .records
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        records.sort_by(|a, b| a.id().cmp(b.id()));
        records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
