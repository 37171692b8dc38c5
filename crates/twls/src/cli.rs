use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use crate::args::Args;
use crate::commands::Command;
use crate::commands::Project;
use crate::commands::TwlsCommand;

/// Twig template reference index
#[derive(Parser)]
#[command(name = "twls")]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: TwlsCommand,

    #[command(flatten)]
    pub args: Args,
}

/// Parse CLI arguments and execute the chosen command
pub fn run(args: Vec<String>) -> Result<ExitCode> {
    let cli = Cli::try_parse_from(args).unwrap_or_else(|e| {
        e.exit();
    });

    let project = Project::discover(&cli.args.global)?;
    let _guard = crate::logging::init_tracing(&cli.args.global, &project);

    let exit = cli.command.execute(&cli.args, project)?;
    Ok(exit.report(cli.args.global.quiet))
}
