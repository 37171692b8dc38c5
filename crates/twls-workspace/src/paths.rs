//! Conversion between filesystem paths and template ids.

use camino::Utf8Path;
use camino::Utf8PathBuf;
use twls_source::TemplateId;

use crate::error::WorkspaceError;

/// Maps absolute paths under a project root to [`TemplateId`]s and back.
///
/// The root is canonicalized once, so ids come out the same whether a path
/// arrives from the walker, a watcher event, or the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathNormalizer {
    root: Utf8PathBuf,
}

impl PathNormalizer {
    pub fn new(root: &Utf8Path) -> Result<Self, WorkspaceError> {
        if !root.is_dir() {
            return Err(WorkspaceError::RootNotFound(root.to_owned()));
        }
        let root = canonicalize(root)?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// The id of `path`, or `None` if it is outside the root.
    ///
    /// Relative paths are taken relative to the root. Paths that no longer
    /// exist (deleted files) are matched lexically.
    #[must_use]
    pub fn to_id(&self, path: &Utf8Path) -> Option<TemplateId> {
        let absolute = if path.is_relative() {
            self.root.join(path)
        } else {
            path.to_owned()
        };

        TemplateId::from_path(&self.root, &absolute).or_else(|| {
            let canonical = canonicalize(&absolute).ok()?;
            TemplateId::from_path(&self.root, &canonical)
        })
    }

    #[must_use]
    pub fn to_path(&self, id: &TemplateId) -> Utf8PathBuf {
        self.root.join(id.as_str())
    }
}

pub(crate) fn canonicalize(path: &Utf8Path) -> Result<Utf8PathBuf, WorkspaceError> {
    let canonical = dunce::canonicalize(path).map_err(|source| WorkspaceError::Io {
        path: path.to_owned(),
        source,
    })?;
    Utf8PathBuf::from_path_buf(canonical).map_err(WorkspaceError::NonUtf8Path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> (tempfile::TempDir, PathNormalizer) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let normalizer = PathNormalizer::new(root).unwrap();
        (dir, normalizer)
    }

    #[test]
    fn test_absolute_path_under_root() {
        let (_dir, normalizer) = project();
        let path = normalizer.root().join("templates/base.twig");
        assert_eq!(
            normalizer.to_id(&path),
            Some(TemplateId::new("templates/base.twig"))
        );
    }

    #[test]
    fn test_relative_path() {
        let (_dir, normalizer) = project();
        assert_eq!(
            normalizer.to_id(Utf8Path::new("./pages/../base.twig")),
            Some(TemplateId::new("base.twig"))
        );
    }

    #[test]
    fn test_outside_root() {
        let (_dir, normalizer) = project();
        let other = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(other.path()).unwrap().join("a.twig");
        assert_eq!(normalizer.to_id(&path), None);
        assert_eq!(normalizer.to_id(normalizer.root()), None);
    }

    #[test]
    fn test_round_trip_through_path() {
        let (_dir, normalizer) = project();
        let id = TemplateId::new("layouts/base.twig");
        let path = normalizer.to_path(&id);
        assert!(path.starts_with(normalizer.root()));
        assert_eq!(normalizer.to_id(&path), Some(id));
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Utf8Path::from_path(dir.path()).unwrap().join("nope");
        assert!(matches!(
            PathNormalizer::new(&missing),
            Err(WorkspaceError::RootNotFound(_))
        ));
    }
}
