use serde::Deserialize;
use serde::Serialize;
use twls_source::TemplateId;

use crate::references::Reference;
use crate::references::TargetName;
use crate::store::IndexStore;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable dump of the index, written by `twls cache`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub version: u32,
    pub templates: Vec<TemplateSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSnapshot {
    pub id: TemplateId,
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<TargetName>,
    pub references: Vec<Reference>,
}

impl IndexSnapshot {
    /// Capture every record in `store`, ordered by id.
    #[must_use]
    pub fn capture(store: &IndexStore) -> Self {
        let templates = store
            .records()
            .iter()
            .map(|record| TemplateSnapshot {
                id: record.id().clone(),
                content_hash: record.content_hash().to_string(),
                parent: record.parent().cloned(),
                references: record.references().to_vec(),
            })
            .collect();
        Self {
            version: SNAPSHOT_VERSION,
            templates,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::record::TemplateRecord;

    #[test]
    fn test_capture_and_json_shape() {
        let store = IndexStore::new();
        for (id, text) in [("b.twig", "{{ x }}"), ("a.twig", "{% extends 'b.twig' %}")] {
            let id = TemplateId::new(id);
            store.upsert(id.clone(), Arc::new(TemplateRecord::new(id, text)));
        }

        let snapshot = IndexSnapshot::capture(&store);
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        let ids: Vec<&str> = snapshot.templates.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["a.twig", "b.twig"]);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["templates"][0]["id"], "a.twig");
        assert_eq!(json["templates"][0]["parent"]["named"], "b.twig");
        assert_eq!(json["templates"][0]["references"][0]["kind"], "extends");
        assert!(json["templates"][1].get("parent").is_none());
        assert_eq!(json["templates"][1]["references"][0]["kind"], "variable_read");

        let back: IndexSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }
}
