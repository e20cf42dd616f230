// Answer input: answer files and --set overrides

use std::{collections::BTreeMap, fs, path::Path};

use crate::error::{CliError, CliResult};

/// Parse one `--set name=value` override
pub fn parse_set(assignment: &str) -> CliResult<(String, String)> {
    match assignment.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(CliError::Answers(format!(
            "`{}` is not of the form name=value",
            assignment
        ))),
    }
}

/// Load a pre-built answers document (YAML or JSON, by extension)
///
/// Scalars are coerced to the engine's string representation; anything
/// nested is rejected since answers are a flat name→value mapping.
pub fn load_answers_file(path: &Path) -> CliResult<BTreeMap<String, String>> {
    let text = fs::read_to_string(path)?;
    let values: BTreeMap<String, serde_yaml::Value> =
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            serde_json::from_str(&text)
                .map_err(|e| CliError::Answers(format!("{}: {}", path.display(), e)))?
        } else {
            serde_yaml::from_str(&text)
                .map_err(|e| CliError::Answers(format!("{}: {}", path.display(), e)))?
        };

    let mut answers = BTreeMap::new();
    for (name, value) in values {
        let rendered = match value {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Null => String::new(),
            other => {
                return Err(CliError::Answers(format!(
                    "answer `{}` must be a scalar, got {:?}",
                    name, other
                )));
            }
        };
        answers.insert(name, rendered);
    }
    Ok(answers)
}
