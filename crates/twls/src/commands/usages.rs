use anyhow::Result;
use clap::Parser;
use twls_semantic::ReferenceKind;

use crate::args::Args;
use crate::commands::require_template;
use crate::commands::Command;
use crate::commands::Project;
use crate::exit::Exit;

#[derive(Debug, Parser)]
pub struct Usages {
    /// Variable, block, or template name to look for.
    symbol: String,

    /// Kind of reference: extends, include, import, block_def,
    /// block_override, variable_read, variable_def, json_path_ref.
    #[arg(long, default_value = "variable_read")]
    kind: ReferenceKind,

    /// Template the query starts from. Defaults to any indexed template.
    #[arg(long, value_name = "TEMPLATE")]
    from: Option<String>,
}

impl Command for Usages {
    fn execute(&self, args: &Args, project: Project) -> Result<Exit> {
        let workspace = project.load()?;
        let engine = workspace.engine();

        let origin = match &self.from {
            Some(name) => require_template(&workspace, name)?,
            None => match engine.all_ids().into_iter().next() {
                Some(id) => id,
                None => return Ok(Exit::success().with_message("No templates indexed.")),
            },
        };

        let usages = engine.find_usages(&origin, &self.symbol, self.kind);
        if !args.global.quiet {
            for location in &usages {
                println!("{}:{}", location.template, location.start);
            }
        }

        if usages.is_empty() {
            Ok(Exit::error().with_message(format!(
                "No {} usages of '{}' found.",
                self.kind, self.symbol
            )))
        } else {
            Ok(Exit::success())
        }
    }
}
