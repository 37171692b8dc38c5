use anyhow::Result;
use clap::Parser;

use crate::args::Args;
use crate::commands::require_template;
use crate::commands::Command;
use crate::commands::Project;
use crate::exit::Exit;

#[derive(Debug, Parser)]
pub struct Chain {
    /// Template path or name, e.g. `templates/page.twig` or `page.twig`.
    template: String,

    /// Also list every block visible from the template and where it is
    /// declared.
    #[arg(long)]
    blocks: bool,
}

impl Command for Chain {
    fn execute(&self, args: &Args, project: Project) -> Result<Exit> {
        let workspace = project.load()?;
        let id = require_template(&workspace, &self.template)?;
        let chain = workspace.engine().inheritance_chain(&id);

        if !args.global.quiet {
            println!("{id}");
            for ancestor in &chain.templates {
                println!("  extends {ancestor}");
            }
            if let Some(target) = &chain.unresolved {
                println!("  extends {target} (not found)");
            }
            if self.blocks {
                for (block, declared_in) in workspace.engine().blocks_in_chain(&id) {
                    println!("{block}\t{declared_in}");
                }
            }
        }

        if chain.cycle_detected {
            return Ok(Exit::error().with_message(format!(
                "Inheritance cycle detected starting from {id}."
            )));
        }
        Ok(Exit::success())
    }
}
