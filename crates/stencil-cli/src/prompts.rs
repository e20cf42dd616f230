// Interactive answer collection

use std::{
    collections::BTreeMap,
    io::{self, Write},
};

use stencil_engine::{TemplatePack, VarKind, VariableDef};

use crate::{
    error::{CliError, CliResult},
    output::OutputStyle,
};

/// Prompt for every variable not already answered
///
/// Derived variables are never prompted; `known` holds answers supplied via
/// file, `--set`, or a previous generation's manifest. Returns only the newly
/// collected answers. Answer collection happens entirely before any write,
/// so cancelling here leaves the target untouched.
pub fn collect_answers(
    pack: &TemplatePack,
    known: &BTreeMap<String, String>,
) -> CliResult<BTreeMap<String, String>> {
    let mut collected = BTreeMap::new();
    for def in pack.variables.iter().filter(|d| d.derived.is_none()) {
        if known.contains_key(&def.name) {
            continue;
        }
        if let Some(answer) = ask(def)? {
            collected.insert(def.name.clone(), answer);
        }
    }
    Ok(collected)
}

/// Ask one question; `None` means "use the default"
fn ask(def: &VariableDef) -> CliResult<Option<String>> {
    let label = def.prompt.as_deref().unwrap_or(&def.name);
    loop {
        let question = match (&def.kind, &def.default) {
            (VarKind::Bool, Some(default)) => format!("{} (y/n) [{}]:", label, default),
            (VarKind::Bool, None) => format!("{} (y/n):", label),
            (VarKind::Enum, Some(default)) => {
                format!("{} ({}) [{}]:", label, def.choices.join("/"), default)
            }
            (VarKind::Enum, None) => format!("{} ({}):", label, def.choices.join("/")),
            (_, Some(default)) => format!("{} [{}]:", label, default),
            (_, None) => format!("{}:", label),
        };

        let answer = read_line(&question)?;
        if answer.is_empty() {
            if def.default.is_some() {
                return Ok(None);
            }
            println!("an answer is required");
            continue;
        }

        match def.kind {
            VarKind::Bool if stencil_engine::resolver::parse_bool(&answer).is_none() => {
                println!("please answer y or n");
            }
            VarKind::Enum if !def.choices.contains(&answer) => {
                println!("please pick one of: {}", def.choices.join(", "));
            }
            _ => return Ok(Some(answer)),
        }
    }
}

fn read_line(question: &str) -> CliResult<String> {
    let style = OutputStyle::default();
    print!("{}", style.prompt(question));
    io::stdout().flush().map_err(CliError::Io)?;

    let mut input = String::new();
    io::stdin().read_line(&mut input).map_err(CliError::Io)?;
    Ok(input.trim().to_string())
}
