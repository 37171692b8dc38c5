use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use rayon::prelude::*;
use tracing::debug;
use tracing::info;
use tracing::warn;
use twls_conf::Settings;
use twls_semantic::Engine;
use twls_semantic::FileChange;
use twls_semantic::TemplateNames;
use twls_semantic::TemplateRecord;
use twls_source::TemplateId;

use crate::paths::PathNormalizer;
use crate::walk::walk_files;
use crate::walk::WalkOptions;
use crate::watcher::TemplateWatcher;
use crate::watcher::WatchConfig;
use crate::watcher::WatchEvent;

/// A project on disk and the engine indexing it.
pub struct Workspace {
    normalizer: PathNormalizer,
    settings: Settings,
    engine: Engine,
}

impl Workspace {
    /// Open `root` without indexing anything yet.
    pub fn open(root: &Utf8Path, settings: Settings) -> Result<Self> {
        let normalizer = PathNormalizer::new(root)
            .with_context(|| format!("Failed to open project at {root}"))?;
        let engine = Engine::new(template_names(&settings));
        Ok(Self {
            normalizer,
            settings,
            engine,
        })
    }

    /// Open `root` and index every template under it.
    pub fn load(root: &Utf8Path, settings: Settings) -> Result<Self> {
        let workspace = Self::open(root, settings)?;
        let count = workspace.index_all();
        info!(root = %workspace.root(), templates = count, "indexed project");
        Ok(workspace)
    }

    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        self.normalizer.root()
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    #[must_use]
    pub fn normalizer(&self) -> &PathNormalizer {
        &self.normalizer
    }

    #[must_use]
    pub fn is_template(&self, path: &Utf8Path) -> bool {
        path.file_name()
            .is_some_and(|name| self.settings.is_template(name))
    }

    /// Template files under `paths`, or under the whole root if `paths` is
    /// empty. Relative paths are taken from the root.
    #[must_use]
    pub fn discover(&self, paths: &[Utf8PathBuf]) -> Vec<Utf8PathBuf> {
        let paths: Vec<Utf8PathBuf> = if paths.is_empty() {
            vec![self.root().to_owned()]
        } else {
            paths
                .iter()
                .map(|path| {
                    if path.is_relative() {
                        self.root().join(path)
                    } else {
                        path.clone()
                    }
                })
                .collect()
        };
        let options = WalkOptions::excluding(&self.settings.exclude);
        walk_files(&paths, |path| self.is_template(path), &options)
    }

    /// Index every template under the root in parallel. Returns how many
    /// were indexed.
    pub fn index_all(&self) -> usize {
        self.index_paths(&self.discover(&[]))
    }

    /// Index `paths` in parallel; unreadable files are logged and skipped.
    pub fn index_paths(&self, paths: &[Utf8PathBuf]) -> usize {
        paths
            .par_iter()
            .filter(|path| self.index_path(path).is_some())
            .count()
    }

    fn index_path(&self, path: &Utf8Path) -> Option<Arc<TemplateRecord>> {
        let id = self.normalizer.to_id(path)?;
        match std::fs::read_to_string(path) {
            Ok(text) => Some(self.engine.index(id, &text)),
            Err(error) => {
                warn!(path = %path, %error, "skipping unreadable template");
                None
            }
        }
    }

    /// Turn a watcher event into the change the engine should see.
    #[must_use]
    pub fn change_for(&self, event: &WatchEvent) -> Option<FileChange> {
        let id = self.normalizer.to_id(event.path())?;
        match event {
            WatchEvent::Changed(path) => match std::fs::read_to_string(path) {
                Ok(text) => Some(FileChange::Changed { id, text }),
                Err(error) => {
                    debug!(path = %path, %error, "changed file is no longer readable");
                    Some(FileChange::Deleted { id })
                }
            },
            WatchEvent::Deleted(_) => Some(FileChange::Deleted { id }),
        }
    }

    /// Apply a batch of watcher events. Returns the ids that changed.
    pub fn apply_events(&self, events: &[WatchEvent]) -> Vec<TemplateId> {
        events
            .iter()
            .filter_map(|event| self.change_for(event))
            .map(|change| {
                let id = change.id().clone();
                self.engine.apply(change);
                id
            })
            .collect()
    }

    /// A watcher for this project's templates.
    pub fn watch(&self, debounce: Duration) -> Result<TemplateWatcher> {
        TemplateWatcher::new(WatchConfig {
            root: self.root().to_owned(),
            debounce,
            extensions: self.settings.extensions.clone(),
            exclude: self.settings.exclude.clone(),
        })
    }

    /// Resolve a template given on the command line: a path to a file, or an
    /// id as written in `extends`/`include`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<TemplateId> {
        let path = Utf8Path::new(name);
        if let Some(id) = self.normalizer.to_id(path) {
            if self.engine.get(&id).is_some() {
                return Some(id);
            }
        }
        if path.is_relative() {
            if let Ok(cwd) = std::env::current_dir() {
                if let Ok(cwd) = Utf8PathBuf::from_path_buf(cwd) {
                    if let Some(id) = self.normalizer.to_id(&cwd.join(path)) {
                        if self.engine.get(&id).is_some() {
                            return Some(id);
                        }
                    }
                }
            }
        }
        self.engine.names().resolve(name, self.engine.store())
    }
}

/// The name resolution rules described by `settings`.
#[must_use]
pub fn template_names(settings: &Settings) -> TemplateNames {
    let mut names = TemplateNames::new();
    for dir in &settings.template_dirs {
        names.add_root(dir.as_str());
    }
    for (namespace, roots) in &settings.namespaces {
        for root in roots {
            names.add_namespace(namespace, root.as_str());
        }
    }
    names
}
