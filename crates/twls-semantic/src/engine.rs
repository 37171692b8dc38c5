use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;
use tracing::trace;
use twls_source::ByteOffset;
use twls_source::LineCol;
use twls_source::TemplateId;

use crate::cancel::CancellationToken;
use crate::cancel::Cancelled;
use crate::diagnostics;
use crate::diagnostics::Diagnostic;
use crate::names::TemplateNames;
use crate::record::content_hash;
use crate::record::TemplateRecord;
use crate::references::ReferenceKind;
use crate::resolver::InheritanceChain;
use crate::resolver::Location;
use crate::resolver::Resolver;
use crate::snapshot::IndexSnapshot;
use crate::store::IndexStore;

/// A change to one template file, as reported by the host or a watcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileChange {
    Changed { id: TemplateId, text: String },
    Deleted { id: TemplateId },
}

impl FileChange {
    #[must_use]
    pub fn id(&self) -> &TemplateId {
        match self {
            FileChange::Changed { id, .. } | FileChange::Deleted { id } => id,
        }
    }
}

/// The template index and every query over it.
///
/// All methods take `&self` and may be called from any thread. Indexing
/// parses and extracts before touching the store, so queries never wait on
/// a parse and never see a half-built record.
#[derive(Debug, Default)]
pub struct Engine {
    store: IndexStore,
    names: TemplateNames,
}

impl Engine {
    #[must_use]
    pub fn new(names: TemplateNames) -> Self {
        Self {
            store: IndexStore::new(),
            names,
        }
    }

    #[must_use]
    pub fn names(&self) -> &TemplateNames {
        &self.names
    }

    #[must_use]
    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    #[must_use]
    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.store, &self.names)
    }

    /// Parse `text` and store it as the new content of `id`. Unchanged content
    /// keeps the existing record.
    pub fn index(&self, id: TemplateId, text: &str) -> Arc<TemplateRecord> {
        let hash = content_hash(text);
        if let Some(existing) = self.store.get(&id) {
            if existing.content_hash() == hash {
                trace!(template = %id, "content unchanged, keeping record");
                return existing;
            }
        }

        let record = Arc::new(TemplateRecord::with_hash(id.clone(), text, hash));
        debug!(
            template = %id,
            references = record.references().len(),
            errors = record.tree().errors().len(),
            "indexed template"
        );
        self.store.upsert(id, Arc::clone(&record));
        record
    }

    /// Drop `id` from the index. Returns whether it was indexed.
    pub fn remove(&self, id: &TemplateId) -> bool {
        let removed = self.store.remove(id).is_some();
        if removed {
            debug!(template = %id, "removed template");
        }
        removed
    }

    pub fn apply(&self, change: FileChange) {
        match change {
            FileChange::Changed { id, text } => {
                self.index(id, &text);
            }
            FileChange::Deleted { id } => {
                self.remove(&id);
            }
        }
    }

    #[must_use]
    pub fn get(&self, id: &TemplateId) -> Option<Arc<TemplateRecord>> {
        self.store.get(id)
    }

    #[must_use]
    pub fn all_ids(&self) -> BTreeSet<TemplateId> {
        self.store.all_ids()
    }

    #[must_use]
    pub fn resolve_definition(&self, id: &TemplateId, offset: ByteOffset) -> Option<Location> {
        self.resolver().resolve_definition(id, offset)
    }

    #[must_use]
    pub fn resolve_definition_at(&self, id: &TemplateId, position: LineCol) -> Option<Location> {
        self.resolver().resolve_definition_at(id, position)
    }

    #[must_use]
    pub fn find_usages(&self, id: &TemplateId, symbol: &str, kind: ReferenceKind) -> Vec<Location> {
        self.resolver().find_usages(id, symbol, kind)
    }

    pub fn find_usages_cancellable(
        &self,
        id: &TemplateId,
        symbol: &str,
        kind: ReferenceKind,
        token: &CancellationToken,
    ) -> Result<Vec<Location>, Cancelled> {
        self.resolver()
            .find_usages_cancellable(id, symbol, kind, token)
    }

    #[must_use]
    pub fn inheritance_chain(&self, id: &TemplateId) -> InheritanceChain {
        self.resolver().inheritance_chain(id)
    }

    #[must_use]
    pub fn template_usages(&self, id: &TemplateId) -> Vec<Location> {
        self.resolver().template_usages(id)
    }

    #[must_use]
    pub fn blocks_in_chain(&self, id: &TemplateId) -> BTreeMap<String, TemplateId> {
        self.resolver().blocks_in_chain(id)
    }

    /// Diagnostics for `id`; empty if it is not indexed.
    #[must_use]
    pub fn diagnostics(&self, id: &TemplateId) -> Vec<Diagnostic> {
        self.store
            .get(id)
            .map(|record| diagnostics::collect(&record, &self.resolver()))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot::capture(&self.store)
    }
}
