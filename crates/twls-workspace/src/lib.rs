mod error;
mod paths;
mod walk;
mod watcher;
mod workspace;

pub use error::WorkspaceError;
pub use paths::PathNormalizer;
pub use walk::walk_files;
pub use walk::WalkOptions;
pub use watcher::TemplateWatcher;
pub use watcher::WatchConfig;
pub use watcher::WatchEvent;
pub use workspace::template_names;
pub use workspace::Workspace;
