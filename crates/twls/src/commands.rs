mod cache;
mod chain;
mod check;
mod definition;
mod usages;
mod watch;

use anyhow::Context;
use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Subcommand;
use twls_conf::Settings;
use twls_source::TemplateId;
use twls_workspace::Workspace;

use crate::args::Args;
use crate::args::GlobalArgs;
use crate::exit::Exit;

pub trait Command {
    fn execute(&self, args: &Args, project: Project) -> Result<Exit>;
}

#[derive(Debug, Subcommand)]
pub enum TwlsCommand {
    /// Report parse errors and unresolved references
    Check(self::check::Check),
    /// Print the inheritance chain of a template
    Chain(self::chain::Chain),
    /// Find every usage of a symbol
    Usages(self::usages::Usages),
    /// Resolve the reference at a position
    Definition(self::definition::Definition),
    /// Write the index snapshot as JSON
    Cache(self::cache::Cache),
    /// Keep the index up to date as files change
    Watch(self::watch::Watch),
}

impl Command for TwlsCommand {
    fn execute(&self, args: &Args, project: Project) -> Result<Exit> {
        match self {
            TwlsCommand::Check(command) => command.execute(args, project),
            TwlsCommand::Chain(command) => command.execute(args, project),
            TwlsCommand::Usages(command) => command.execute(args, project),
            TwlsCommand::Definition(command) => command.execute(args, project),
            TwlsCommand::Cache(command) => command.execute(args, project),
            TwlsCommand::Watch(command) => command.execute(args, project),
        }
    }
}

/// The project root and its settings, resolved before any command runs.
#[derive(Debug)]
pub struct Project {
    pub root: Utf8PathBuf,
    pub settings: Settings,
}

impl Project {
    pub fn discover(args: &GlobalArgs) -> Result<Self> {
        let root = match &args.root {
            Some(root) => root.clone(),
            None => {
                let cwd = std::env::current_dir().context("Failed to get current directory")?;
                Utf8PathBuf::from_path_buf(cwd)
                    .map_err(|_| anyhow::anyhow!("Current directory is not valid UTF-8"))?
            }
        };
        let settings =
            Settings::new(root.as_std_path()).context("Failed to load settings")?;
        Ok(Self { root, settings })
    }

    /// Index the whole project.
    pub fn load(self) -> Result<Workspace> {
        Workspace::load(&self.root, self.settings)
    }
}

/// Look up a template named on the command line, or fail with a message.
fn require_template(workspace: &Workspace, name: &str) -> Result<TemplateId> {
    workspace
        .lookup(name)
        .with_context(|| format!("Template '{name}' is not indexed"))
}
