// Generate a new project from a template pack

use std::{collections::BTreeMap, path::PathBuf};

use clap::Args;
use stencil_engine::{Generator, GeneratorConfig, PackLoader, RunStatus};

use crate::{error::CliResult, input, output, prompts};

#[derive(Debug, Args)]
pub struct NewArgs {
    /// Template pack directory (contains stencil.yaml)
    pub template: PathBuf,

    /// Target directory for the generated project
    pub target: PathBuf,

    /// Pre-built answers document (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    pub answers: Option<PathBuf>,

    /// Explicit answer override, repeatable
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub set: Vec<String>,

    /// Never prompt; missing required answers fail with a full list
    #[arg(long)]
    pub yes: bool,

    /// Show what would be written without touching the filesystem
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn run(args: NewArgs) -> CliResult<RunStatus> {
    let pack = PackLoader::load(&args.template)?;

    let mut raw: BTreeMap<String, String> = match &args.answers {
        Some(path) => input::load_answers_file(path)?,
        None => BTreeMap::new(),
    };
    for assignment in &args.set {
        let (name, value) = input::parse_set(assignment)?;
        raw.insert(name, value);
    }
    if !args.yes {
        raw.extend(prompts::collect_answers(&pack, &raw)?);
    }

    let generator = Generator::with_config(
        pack,
        GeneratorConfig {
            dry_run: args.dry_run,
            ..Default::default()
        },
    );
    let report = generator.generate(&raw, &args.target).await?;
    output::print_report(&report);
    Ok(report.status())
}
