use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use twls_source::Severity;

use crate::args::Args;
use crate::commands::Command;
use crate::commands::Project;
use crate::exit::Exit;

#[derive(Debug, Parser)]
pub struct Watch {
    /// Quiet period in milliseconds before a batch of changes is applied.
    #[arg(long, default_value_t = 250)]
    debounce_ms: u64,
}

impl Command for Watch {
    fn execute(&self, args: &Args, project: Project) -> Result<Exit> {
        let workspace = project.load()?;
        let watcher = workspace.watch(Duration::from_millis(self.debounce_ms))?;
        if !args.global.quiet {
            eprintln!(
                "Watching {} ({} templates). Press Ctrl-C to stop.",
                workspace.root(),
                workspace.engine().all_ids().len()
            );
        }

        loop {
            let events = match watcher.recv_events_timeout(Duration::from_secs(1)) {
                Ok(events) => events,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Ok(Exit::error().with_message("File watcher stopped."));
                }
            };
            for id in workspace.apply_events(&events) {
                let diagnostics = workspace.engine().diagnostics(&id);
                let errors = diagnostics
                    .iter()
                    .filter(|d| d.severity == Severity::Error)
                    .count();
                info!(template = %id, diagnostics = diagnostics.len(), "reindexed");
                if !args.global.quiet {
                    let state = if workspace.engine().get(&id).is_some() {
                        "updated"
                    } else {
                        "removed"
                    };
                    println!("{state} {id} ({errors} errors)");
                }
            }
        }
    }
}
