use camino::Utf8Path;
use camino::Utf8PathBuf;
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use tracing::warn;

/// Options controlling how [`walk_files`] traverses directories.
#[derive(Clone, Debug, Default)]
pub struct WalkOptions {
    /// Include hidden files and directories (those starting with `.`).
    pub hidden: bool,
    /// Gitignore-style glob patterns. Prefix with `!` to exclude.
    /// Later patterns take precedence over earlier ones.
    pub globs: Vec<String>,
    /// Disable all ignore files (`.gitignore`, `.ignore`, etc.).
    pub no_ignore: bool,
    pub follow_links: bool,
    /// `None` means unlimited.
    pub max_depth: Option<usize>,
}

impl WalkOptions {
    /// Options that skip every path matching one of `patterns`.
    #[must_use]
    pub fn excluding(patterns: &[String]) -> Self {
        Self {
            globs: patterns
                .iter()
                .map(|pattern| format!("!{}", pattern.trim_start_matches('!')))
                .collect(),
            ..Self::default()
        }
    }
}

/// Walk the given paths and collect files that pass `predicate`.
///
/// Each entry in `paths` may be a file or a directory. Files are included
/// directly if `predicate` accepts them; directories are walked recursively.
/// Hidden entries are skipped and `.gitignore` rules respected unless
/// `options` says otherwise.
///
/// Returns a sorted, deduplicated list of canonical paths.
#[must_use]
pub fn walk_files(
    paths: &[Utf8PathBuf],
    predicate: impl Fn(&Utf8Path) -> bool,
    options: &WalkOptions,
) -> Vec<Utf8PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            if predicate(path) {
                files.push(resolve(path));
            }
            continue;
        }

        if !path.is_dir() {
            continue;
        }

        let mut builder = WalkBuilder::new(path.as_std_path());
        // standard_filters resets hidden and friends, so it goes first.
        builder
            .standard_filters(!options.no_ignore)
            .hidden(!options.hidden)
            .follow_links(options.follow_links)
            .require_git(false);

        if let Some(depth) = options.max_depth {
            builder.max_depth(Some(depth));
        }

        if !options.globs.is_empty() {
            let mut overrides = OverrideBuilder::new(path.as_std_path());
            for glob in &options.globs {
                if let Err(error) = overrides.add(glob) {
                    warn!(glob = %glob, %error, "skipping invalid glob");
                }
            }
            match overrides.build() {
                Ok(built) => {
                    builder.overrides(built);
                }
                Err(error) => warn!(%error, "ignoring glob overrides"),
            }
        }

        for entry in builder.build().filter_map(Result::ok) {
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let Some(utf8) = Utf8Path::from_path(entry.path()) else {
                continue;
            };
            if predicate(utf8) {
                files.push(resolve(utf8));
            }
        }
    }

    files.sort();
    files.dedup();
    files
}

fn resolve(path: &Utf8Path) -> Utf8PathBuf {
    crate::paths::canonicalize(path).unwrap_or_else(|_| path.to_owned())
}
