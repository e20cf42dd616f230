// Re-sync a generated project against a newer template revision

use std::{collections::BTreeMap, path::PathBuf};

use clap::Args;
use stencil_engine::{Generator, GeneratorConfig, PackLoader, ProjectManifest, RunStatus};

use super::ConflictStyleArg;
use crate::{error::CliResult, input, output, prompts};

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Template pack directory (contains stencil.yaml)
    pub template: PathBuf,

    /// Previously generated project directory
    #[arg(default_value = ".")]
    pub target: PathBuf,

    /// Pre-built answers document (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    pub answers: Option<PathBuf>,

    /// Explicit answer override, repeatable
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub set: Vec<String>,

    /// Never prompt; only recorded and supplied answers are used
    #[arg(long)]
    pub yes: bool,

    /// Show what would change without touching the filesystem
    #[arg(long)]
    pub dry_run: bool,

    /// How conflicting files are materialized
    #[arg(long, value_enum, default_value = "side-file")]
    pub conflicts: ConflictStyleArg,
}

pub async fn run(args: UpdateArgs) -> CliResult<RunStatus> {
    let pack = PackLoader::load(&args.template)?;

    let mut overrides: BTreeMap<String, String> = match &args.answers {
        Some(path) => input::load_answers_file(path)?,
        None => BTreeMap::new(),
    };
    for assignment in &args.set {
        let (name, value) = input::parse_set(assignment)?;
        overrides.insert(name, value);
    }

    // Prompt only for variables with no recorded answer and no override;
    // everything else is carried over from the last generation.
    if !args.yes {
        let manifest = ProjectManifest::load(&args.target)?;
        let mut known = manifest.answers.clone();
        known.extend(overrides.clone());
        overrides.extend(prompts::collect_answers(&pack, &known)?);
    }

    let generator = Generator::with_config(
        pack,
        GeneratorConfig {
            conflict_style: args.conflicts.into(),
            dry_run: args.dry_run,
            ..Default::default()
        },
    );
    let report = generator.update(&overrides, &args.target).await?;
    output::print_report(&report);
    Ok(report.status())
}
