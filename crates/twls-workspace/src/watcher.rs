//! Filesystem watching for incremental re-indexing.
//!
//! Raw `notify` events are filtered and debounced on a background thread and
//! handed out in batches, one entry per path.

use std::collections::BTreeSet;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use anyhow::Context;
use anyhow::Result;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;
use notify::Config;
use notify::Event;
use notify::EventKind;
use notify::RecommendedWatcher;
use notify::RecursiveMode;
use notify::Watcher;
use tracing::debug;
use tracing::trace;
use tracing::warn;

/// What happened to a path by the time its batch was flushed.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum WatchEvent {
    /// Created, modified, or renamed into place.
    Changed(Utf8PathBuf),
    Deleted(Utf8PathBuf),
}

impl WatchEvent {
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        match self {
            WatchEvent::Changed(path) | WatchEvent::Deleted(path) => path,
        }
    }
}

#[derive(Clone, Debug)]
pub struct WatchConfig {
    /// Watched recursively.
    pub root: Utf8PathBuf,
    /// Quiet period after the last event before a batch is flushed.
    pub debounce: Duration,
    /// Template extensions, without the dot.
    pub extensions: Vec<String>,
    /// Gitignore-style patterns, relative to `root`.
    pub exclude: Vec<String>,
}

impl WatchConfig {
    #[must_use]
    pub fn new(root: Utf8PathBuf) -> Self {
        Self {
            root,
            debounce: Duration::from_millis(250),
            extensions: vec!["twig".to_string()],
            exclude: Vec::new(),
        }
    }
}

/// Decides which paths under the root the watcher reports.
#[derive(Debug)]
struct PathFilter {
    root: Utf8PathBuf,
    extensions: Vec<String>,
    exclude: Gitignore,
}

impl PathFilter {
    fn new(config: &WatchConfig) -> Self {
        let mut builder = GitignoreBuilder::new(config.root.as_std_path());
        for pattern in &config.exclude {
            if let Err(error) = builder.add_line(None, pattern) {
                warn!(pattern = %pattern, %error, "skipping invalid exclude pattern");
            }
        }
        let exclude = builder.build().unwrap_or_else(|error| {
            warn!(%error, "ignoring exclude patterns");
            Gitignore::empty()
        });
        Self {
            root: config.root.clone(),
            extensions: config.extensions.clone(),
            exclude,
        }
    }

    fn accepts(&self, path: &Utf8Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        if relative
            .components()
            .any(|component| component.as_str().starts_with('.'))
        {
            return false;
        }
        let Some(file_name) = path.file_name() else {
            return false;
        };
        let has_extension = self.extensions.iter().any(|extension| {
            file_name
                .strip_suffix(extension.as_str())
                .is_some_and(|stem| stem.len() > 1 && stem.ends_with('.'))
        });
        has_extension
            && !self
                .exclude
                .matched_path_or_any_parents(relative.as_std_path(), false)
                .is_ignore()
    }
}

/// Watches a project root and reports batches of template changes.
///
/// Dropping the watcher stops the background thread.
pub struct TemplateWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<Vec<WatchEvent>>,
    _handle: thread::JoinHandle<()>,
}

impl TemplateWatcher {
    pub fn new(config: WatchConfig) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel();
        let (watch_tx, watch_rx) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let _ = event_tx.send(event);
                }
                Err(error) => warn!(%error, "file watcher error"),
            },
            Config::default(),
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(config.root.as_std_path(), RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", config.root))?;
        debug!(root = %config.root, "watching for template changes");

        let filter = PathFilter::new(&config);
        let debounce = config.debounce;
        let handle = thread::Builder::new()
            .name("twls-watcher".to_string())
            .spawn(move || process_events(&event_rx, &watch_tx, &filter, debounce))
            .context("Failed to spawn watcher thread")?;

        Ok(Self {
            _watcher: watcher,
            rx: watch_rx,
            _handle: handle,
        })
    }

    /// The next batch, if one is ready. Never blocks.
    #[must_use]
    pub fn try_recv_events(&self) -> Vec<WatchEvent> {
        self.rx.try_recv().unwrap_or_default()
    }

    /// Wait up to `timeout` for the next batch. `Disconnected` means the
    /// background thread has stopped.
    pub fn recv_events_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Vec<WatchEvent>, mpsc::RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

fn process_events(
    event_rx: &mpsc::Receiver<Event>,
    watch_tx: &mpsc::Sender<Vec<WatchEvent>>,
    filter: &PathFilter,
    debounce: Duration,
) {
    let mut pending: BTreeSet<Utf8PathBuf> = BTreeSet::new();
    let mut last_event = Instant::now();

    loop {
        match event_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(event) => {
                let paths = relevant_paths(event, filter);
                if !paths.is_empty() {
                    pending.extend(paths);
                    last_event = Instant::now();
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        if !pending.is_empty() && last_event.elapsed() >= debounce {
            let batch = classify(std::mem::take(&mut pending));
            trace!(events = batch.len(), "flushing watch batch");
            if watch_tx.send(batch).is_err() {
                break;
            }
        }
    }
}

fn relevant_paths(event: Event, filter: &PathFilter) -> Vec<Utf8PathBuf> {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return Vec::new();
    }
    event
        .paths
        .into_iter()
        .filter_map(|path| Utf8PathBuf::try_from(path).ok())
        .filter(|path| filter.accepts(path))
        .collect()
}

/// Event kinds are unreliable across platforms (renames in particular), so
/// each path is classified by whether it exists at flush time.
fn classify(paths: BTreeSet<Utf8PathBuf>) -> Vec<WatchEvent> {
    paths
        .into_iter()
        .map(|path| {
            if path.is_file() {
                WatchEvent::Changed(path)
            } else {
                WatchEvent::Deleted(path)
            }
        })
        .collect()
}
