use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use twls_source::TemplateId;
use twls_templates::ParsedTemplate;

use crate::references::extract;
use crate::references::Reference;
use crate::references::ReferenceKind;
use crate::references::TargetName;

/// Everything the index knows about one template. Built once per content
/// version and never mutated; re-indexing replaces the whole record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TemplateRecord {
    id: TemplateId,
    tree: ParsedTemplate,
    references: Vec<Reference>,
    parent: Option<TargetName>,
    content_hash: String,
}

impl TemplateRecord {
    /// Parse and extract `text`.
    #[must_use]
    pub fn new(id: TemplateId, text: &str) -> Self {
        let hash = content_hash(text);
        Self::with_hash(id, text, hash)
    }

    pub(crate) fn with_hash(id: TemplateId, text: &str, content_hash: String) -> Self {
        let tree = twls_templates::parse(text);
        let references = extract(&id, &tree);
        let parent = references
            .iter()
            .find(|r| r.kind == ReferenceKind::Extends)
            .map(|r| r.target.clone());
        Self {
            id,
            tree,
            references,
            parent,
            content_hash,
        }
    }

    #[must_use]
    pub fn id(&self) -> &TemplateId {
        &self.id
    }

    #[must_use]
    pub fn tree(&self) -> &ParsedTemplate {
        &self.tree
    }

    #[must_use]
    pub fn source(&self) -> &str {
        self.tree.source()
    }

    /// References in source order.
    #[must_use]
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// Target of the first `extends`, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&TargetName> {
        self.parent.as_ref()
    }

    #[must_use]
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// The block tag declaring `name` in this template, definition or
    /// override. Blocks inside an `embed` belong to the embedded template.
    #[must_use]
    pub fn block(&self, name: &str) -> Option<&Reference> {
        self.blocks().find(|r| r.target.is(name))
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Reference> {
        self.references
            .iter()
            .filter(|r| r.kind.is_block() && r.embed.is_none())
    }
}

/// Hex SHA-256 of template source.
#[must_use]
pub fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}
