use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use camino::Utf8Path;
use serde::Deserialize;
use serde::Serialize;

/// Project-relative, normalized template path. The key of the template index.
///
/// Construction always normalizes, so two spellings of the same path
/// (`./pages/../base.twig`, `base.twig`) compare equal.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(Arc<str>);

impl TemplateId {
    #[must_use]
    pub fn new(path: &str) -> Self {
        Self(Arc::from(normalize(path)))
    }

    /// Build an id for `path` relative to `root`. Returns `None` when `path`
    /// does not live under `root`.
    #[must_use]
    pub fn from_path(root: &Utf8Path, path: &Utf8Path) -> Option<Self> {
        let relative = path.strip_prefix(root).ok()?;
        let id = Self::new(relative.as_str());
        (!id.is_empty()).then_some(id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Final path segment, e.g. `base.twig` for `layouts/base.twig`.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Debug for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TemplateId({:?})", &*self.0)
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TemplateId {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for TemplateId {
    fn from(path: String) -> Self {
        Self::new(&path)
    }
}

impl AsRef<str> for TemplateId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for TemplateId {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

/// Normalize a template path into its canonical id form.
///
/// Backslashes become `/`, empty and `.` segments are dropped, and `..` pops
/// the previous segment without ever climbing above the root.
#[must_use]
pub fn normalize(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }

    segments.join("/")
}
