use rustc_hash::FxHashMap;
use twls_source::normalize;
use twls_source::TemplateId;

use crate::store::IndexStore;

/// Maps the template names written in `extends`/`include`/... to index keys,
/// the way a Twig filesystem loader would.
///
/// `@Admin/layout.twig` is looked up under every root registered for the
/// `Admin` namespace. Any other name is looked up under each template root in
/// order and finally as a project-relative path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TemplateNames {
    roots: Vec<String>,
    namespaces: FxHashMap<String, Vec<String>>,
}

impl TemplateNames {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_root(mut self, root: &str) -> Self {
        self.add_root(root);
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: &str, root: &str) -> Self {
        self.add_namespace(namespace, root);
        self
    }

    pub fn add_root(&mut self, root: &str) {
        let root = normalize(root);
        if !self.roots.contains(&root) {
            self.roots.push(root);
        }
    }

    pub fn add_namespace(&mut self, namespace: &str, root: &str) {
        let namespace = namespace.trim_start_matches('@').to_string();
        let roots = self.namespaces.entry(namespace).or_default();
        let root = normalize(root);
        if !roots.contains(&root) {
            roots.push(root);
        }
    }

    #[must_use]
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Every id `name` could refer to, most preferred first.
    #[must_use]
    pub fn candidates(&self, name: &str) -> Vec<TemplateId> {
        if let Some(rest) = name.strip_prefix('@') {
            let Some((namespace, path)) = rest.split_once('/') else {
                return Vec::new();
            };
            return self
                .namespaces
                .get(namespace)
                .map(|roots| roots.iter().map(|root| join(root, path)).collect())
                .unwrap_or_default();
        }

        let mut candidates: Vec<TemplateId> =
            self.roots.iter().map(|root| join(root, name)).collect();
        let bare = TemplateId::new(name);
        if !candidates.contains(&bare) {
            candidates.push(bare);
        }
        candidates
    }

    /// The first candidate for `name` present in `store`.
    #[must_use]
    pub fn resolve(&self, name: &str, store: &IndexStore) -> Option<TemplateId> {
        self.candidates(name)
            .into_iter()
            .find(|candidate| store.contains(candidate))
    }
}

fn join(root: &str, name: &str) -> TemplateId {
    if root.is_empty() {
        TemplateId::new(name)
    } else {
        TemplateId::new(&format!("{root}/{name}"))
    }
}
