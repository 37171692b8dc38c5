use anyhow::Context;
use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use tracing::info;

use crate::args::Args;
use crate::commands::Command;
use crate::commands::Project;
use crate::exit::Exit;

#[derive(Debug, Parser)]
pub struct Cache {
    /// Write the snapshot here instead of stdout.
    #[arg(long, short)]
    output: Option<Utf8PathBuf>,
}

impl Command for Cache {
    fn execute(&self, _args: &Args, project: Project) -> Result<Exit> {
        let workspace = project.load()?;
        let snapshot = workspace.engine().snapshot();
        let json =
            serde_json::to_string_pretty(&snapshot).context("Failed to serialize snapshot")?;

        match &self.output {
            Some(path) => {
                std::fs::write(path, json + "\n")
                    .with_context(|| format!("Failed to write {path}"))?;
                info!(path = %path, templates = snapshot.templates.len(), "wrote snapshot");
            }
            None => println!("{json}"),
        }
        Ok(Exit::success())
    }
}
