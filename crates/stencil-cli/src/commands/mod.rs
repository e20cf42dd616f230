// Command definitions and dispatch

pub mod new;
pub mod update;

use clap::{Parser, Subcommand, ValueEnum};
use stencil_engine::{ConflictStyle, RunStatus};

use crate::error::CliResult;

/// Parameterized project scaffolding with template updates
#[derive(Debug, Parser)]
#[command(name = "stencil", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a new project from a template pack
    New(new::NewArgs),
    /// Re-sync a generated project against a newer template revision
    Update(update::UpdateArgs),
}

/// CLI spelling of the conflict materialization styles
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConflictStyleArg {
    /// Write the new render to `<path>.new` next to the conflicting file
    SideFile,
    /// Rewrite the file with conflict markers around both versions
    Markers,
}

impl From<ConflictStyleArg> for ConflictStyle {
    fn from(arg: ConflictStyleArg) -> Self {
        match arg {
            ConflictStyleArg::SideFile => ConflictStyle::SideFile,
            ConflictStyleArg::Markers => ConflictStyle::Markers,
        }
    }
}

/// Execute the parsed command
pub async fn run(cli: Cli) -> CliResult<RunStatus> {
    match cli.command {
        Commands::New(args) => new::run(args).await,
        Commands::Update(args) => update::run(args).await,
    }
}
