use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::trace;
use twls_source::ByteOffset;
use twls_source::LineCol;
use twls_source::Span;
use twls_source::TemplateId;

use crate::cancel::CancellationToken;
use crate::cancel::Cancelled;
use crate::names::TemplateNames;
use crate::record::TemplateRecord;
use crate::references::Reference;
use crate::references::ReferenceKind;
use crate::references::TargetName;
use crate::store::IndexStore;

/// A position inside an indexed template.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Location {
    pub template: TemplateId,
    pub span: Span,
    pub start: LineCol,
}

impl Location {
    /// The start of a template, used as the target of template references.
    #[must_use]
    pub fn root(template: TemplateId) -> Self {
        Self {
            template,
            span: Span::default(),
            start: LineCol::default(),
        }
    }

    fn of(reference: &Reference) -> Self {
        Self {
            template: reference.source.clone(),
            span: reference.span,
            start: reference.start,
        }
    }
}

/// Where a template's `extends` leads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Parent {
    Resolved(TemplateId),
    /// Named, but no candidate is indexed.
    Unresolved(String),
    /// Not a string literal.
    Dynamic,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InheritanceChain {
    /// Ancestors, nearest first. Never contains the starting template.
    pub templates: Vec<TemplateId>,
    pub cycle_detected: bool,
    /// The parent that stopped the walk because it could not be resolved.
    pub unresolved: Option<TargetName>,
}

/// Read-only queries over an [`IndexStore`]. Cheap to construct per query.
#[derive(Clone, Copy, Debug)]
pub struct Resolver<'a> {
    store: &'a IndexStore,
    names: &'a TemplateNames,
}

impl<'a> Resolver<'a> {
    #[must_use]
    pub fn new(store: &'a IndexStore, names: &'a TemplateNames) -> Self {
        Self { store, names }
    }

    #[must_use]
    pub fn resolve_template(&self, target: &TargetName) -> Option<TemplateId> {
        self.names.resolve(target.named()?, self.store)
    }

    #[must_use]
    pub fn parent(&self, record: &TemplateRecord) -> Option<Parent> {
        let parent = match record.parent()? {
            TargetName::Unknown => Parent::Dynamic,
            TargetName::Named(name) => match self.names.resolve(name, self.store) {
                Some(id) => Parent::Resolved(id),
                None => Parent::Unresolved(name.clone()),
            },
        };
        Some(parent)
    }

    /// The reference under `offset`: the innermost, i.e. latest starting,
    /// reference whose span contains it. Failing that, the template
    /// reference whose tag contains it.
    #[must_use]
    pub fn reference_at(record: &TemplateRecord, offset: ByteOffset) -> Option<&Reference> {
        let references = record.references();
        references
            .iter()
            .filter(|reference| reference.span.contains(offset))
            .max_by_key(|reference| reference.span.start())
            .or_else(|| {
                references
                    .iter()
                    .filter(|reference| reference.tag.is_some_and(|tag| tag.contains(offset)))
                    .max_by_key(|reference| reference.span.start())
            })
    }

    /// Go-to-definition for the reference at `offset` in `id`.
    #[must_use]
    pub fn resolve_definition(&self, id: &TemplateId, offset: ByteOffset) -> Option<Location> {
        let record = self.store.get(id)?;
        let reference = Self::reference_at(&record, offset)?;
        trace!(template = %id, kind = %reference.kind, target = %reference.target, "resolving definition");

        match reference.kind {
            ReferenceKind::Extends | ReferenceKind::Include | ReferenceKind::Import => self
                .resolve_template(&reference.target)
                .map(Location::root),
            ReferenceKind::BlockDef | ReferenceKind::VariableDef => Some(Location::of(reference)),
            ReferenceKind::BlockOverride => {
                let name = reference.target.named()?;
                let ancestors = match &reference.embed {
                    Some(target) => {
                        let embedded = self.resolve_template(target)?;
                        let mut templates = self.inheritance_chain(&embedded).templates;
                        templates.insert(0, embedded);
                        templates
                    }
                    None => self.inheritance_chain(id).templates,
                };
                ancestors
                    .iter()
                    .filter_map(|ancestor| self.store.get(ancestor))
                    .find_map(|ancestor| ancestor.block(name).map(Location::of))
            }
            ReferenceKind::VariableRead => {
                variable_definition(&record, reference.target.named()?, reference.span)
            }
            ReferenceKind::JsonPathRef => {
                variable_definition(&record, reference.root.as_deref()?, reference.span)
            }
        }
    }

    /// Like [`Resolver::resolve_definition`] with a zero-based line/column.
    #[must_use]
    pub fn resolve_definition_at(&self, id: &TemplateId, position: LineCol) -> Option<Location> {
        let record = self.store.get(id)?;
        let offset = record.tree().line_index().offset(position)?;
        self.resolve_definition(id, offset)
    }

    /// Ancestors of `id` following `extends`, nearest first.
    #[must_use]
    pub fn inheritance_chain(&self, id: &TemplateId) -> InheritanceChain {
        let mut chain = InheritanceChain::default();
        let Some(mut current) = self.store.get(id) else {
            return chain;
        };
        let mut seen = FxHashSet::default();
        seen.insert(id.clone());

        while let Some(parent) = self.parent(&current) {
            match parent {
                Parent::Resolved(parent_id) => {
                    if !seen.insert(parent_id.clone()) {
                        chain.cycle_detected = true;
                        break;
                    }
                    let Some(record) = self.store.get(&parent_id) else {
                        // removed between resolution and lookup
                        chain.unresolved = Some(TargetName::Named(parent_id.to_string()));
                        break;
                    };
                    chain.templates.push(parent_id);
                    current = record;
                }
                Parent::Unresolved(name) => {
                    chain.unresolved = Some(TargetName::Named(name));
                    break;
                }
                Parent::Dynamic => {
                    chain.unresolved = Some(TargetName::Unknown);
                    break;
                }
            }
        }

        chain
    }

    /// All references of `kind` named `symbol`, ordered by template then
    /// position. `id` is the template the query comes from; nothing is found
    /// for a template that is not indexed.
    #[must_use]
    pub fn find_usages(&self, id: &TemplateId, symbol: &str, kind: ReferenceKind) -> Vec<Location> {
        self.find_usages_cancellable(id, symbol, kind, &CancellationToken::new())
            .unwrap_or_default()
    }

    /// [`Resolver::find_usages`], checking `token` before each template.
    pub fn find_usages_cancellable(
        &self,
        id: &TemplateId,
        symbol: &str,
        kind: ReferenceKind,
        token: &CancellationToken,
    ) -> Result<Vec<Location>, Cancelled> {
        if !self.store.contains(id) {
            return Ok(Vec::new());
        }
        trace!(template = %id, symbol, %kind, "finding usages");

        let mut usages = Vec::new();
        for record in self.store.records() {
            if token.is_cancelled() {
                return Err(Cancelled);
            }
            usages.extend(
                record
                    .references()
                    .iter()
                    .filter(|reference| matches_usage(reference, symbol, kind))
                    .map(Location::of),
            );
        }
        Ok(usages)
    }

    /// Template references anywhere in the index that resolve to `id`.
    #[must_use]
    pub fn template_usages(&self, id: &TemplateId) -> Vec<Location> {
        self.store
            .records()
            .iter()
            .flat_map(|record| record.references().iter())
            .filter(|reference| reference.kind.is_template())
            .filter(|reference| self.resolve_template(&reference.target).as_ref() == Some(id))
            .map(Location::of)
            .collect()
    }

    /// Every block visible from `id`, mapped to the template whose
    /// declaration wins: the nearest one along the chain.
    #[must_use]
    pub fn blocks_in_chain(&self, id: &TemplateId) -> BTreeMap<String, TemplateId> {
        let chain = self.inheritance_chain(id);
        let mut blocks = BTreeMap::new();

        for template in std::iter::once(id).chain(chain.templates.iter()) {
            let Some(record) = self.store.get(template) else {
                continue;
            };
            for block in record.blocks() {
                if let Some(name) = block.target.named() {
                    blocks
                        .entry(name.to_string())
                        .or_insert_with(|| template.clone());
                }
            }
        }

        blocks
    }
}

fn matches_usage(reference: &Reference, symbol: &str, kind: ReferenceKind) -> bool {
    if reference.kind == kind && reference.target.is(symbol) {
        return true;
    }
    kind == ReferenceKind::VariableRead
        && reference.kind == ReferenceKind::JsonPathRef
        && reference.root.as_deref() == Some(symbol)
}

/// Nearest `VariableDef` of `name` starting before `before`.
fn variable_definition(record: &TemplateRecord, name: &str, before: Span) -> Option<Location> {
    record
        .references()
        .iter()
        .filter(|r| r.kind == ReferenceKind::VariableDef && r.target.is(name))
        .take_while(|r| r.span.start() < before.start())
        .last()
        .map(Location::of)
}
