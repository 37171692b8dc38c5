//! Tracing setup for the command line.
//!
//! Logs go to stderr, filtered by `RUST_LOG` or else by `-q`/`-v` and the
//! `debug` setting. When `log_file` is configured, a second layer writes a
//! daily-rotated file next to it.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::Registry;

use crate::args::GlobalArgs;
use crate::commands::Project;

fn default_level(args: &GlobalArgs, debug: bool) -> &'static str {
    if args.quiet {
        return "error";
    }
    match args.verbose {
        0 if debug => "debug",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber.
///
/// Returns a `WorkerGuard` that must be kept alive for the file logging to
/// flush.
pub fn init_tracing(args: &GlobalArgs, project: &Project) -> Option<WorkerGuard> {
    let level = default_level(args, project.settings.debug);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_filter);

    let (file_layer, guard) = match &project.settings.log_file {
        Some(log_file) => {
            let path = project.root.join(log_file);
            let directory = path
                .parent()
                .map_or_else(|| project.root.clone(), ToOwned::to_owned);
            let file_name = path.file_name().unwrap_or("twls.log");
            let file_appender = tracing_appender::rolling::daily(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let file_filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_thread_names(true)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(file_filter);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // A subscriber may already be installed when running under a test harness.
    let _ = Registry::default()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    guard
}
