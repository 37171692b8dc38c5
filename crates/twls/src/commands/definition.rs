use anyhow::Result;
use clap::Parser;
use twls_source::LineCol;

use crate::args::Args;
use crate::commands::require_template;
use crate::commands::Command;
use crate::commands::Project;
use crate::exit::Exit;

#[derive(Debug, Parser)]
pub struct Definition {
    /// Template containing the reference.
    template: String,

    /// Line, starting at 1.
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    line: u32,

    /// Column in bytes, starting at 1.
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    column: u32,
}

impl Command for Definition {
    fn execute(&self, args: &Args, project: Project) -> Result<Exit> {
        let workspace = project.load()?;
        let id = require_template(&workspace, &self.template)?;
        let position = LineCol::new(self.line - 1, self.column - 1);

        match workspace.engine().resolve_definition_at(&id, position) {
            Some(location) => {
                if !args.global.quiet {
                    println!("{}:{}", location.template, location.start);
                }
                Ok(Exit::success())
            }
            None => Ok(Exit::error().with_message(format!(
                "No definition found at {id}:{position}."
            ))),
        }
    }
}
