//! Template pack loading and load-time validation
//!
//! A pack is a directory with a `stencil.yaml` manifest and an optional
//! `tree/` payload. Every file under `tree/` becomes a rule implicitly
//! (category `always`, no condition); `files:` entries in the manifest
//! either attach metadata to a payload file (by `source`) or declare inline
//! rules (by `path` + `content`).
//!
//! All structural validation happens here, before any answers are read:
//! template and condition syntax, undeclared-variable references, variable
//! definitions, and category tags. A malformed pack fails immediately,
//! regardless of what answers would later be supplied.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use serde::Deserialize;
use tracing::debug;
use walkdir::WalkDir;

use crate::{
    condition::Expr,
    error::EngineError,
    models::{FileRule, TemplatePack, VarKind, VariableDef},
    policy::FileCategory,
    resolver::parse_bool,
    template::TemplateParser,
};

/// Pack manifest file name
pub const PACK_MANIFEST: &str = "stencil.yaml";
/// Payload directory name inside a pack
pub const PACK_TREE: &str = "tree";

#[derive(Debug, Deserialize)]
struct RawPack {
    name: String,
    revision: u64,
    #[serde(default)]
    variables: Vec<VariableDef>,
    #[serde(default)]
    files: Vec<RawFileRule>,
}

#[derive(Debug, Deserialize)]
struct RawFileRule {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    when: Option<String>,
    #[serde(default)]
    category: Option<FileCategory>,
}

/// Loads and validates template packs from disk
pub struct PackLoader;

impl PackLoader {
    /// Load the pack rooted at `dir`
    pub fn load(dir: &Path) -> Result<TemplatePack, EngineError> {
        let manifest_path = dir.join(PACK_MANIFEST);
        let text = fs::read_to_string(&manifest_path).map_err(|e| {
            EngineError::Pack(format!("cannot read {}: {}", manifest_path.display(), e))
        })?;
        let raw: RawPack = serde_yaml::from_str(&text)?;

        let bodies = read_tree(&dir.join(PACK_TREE))?;
        let files = assemble_rules(&raw, bodies)?;

        let pack = TemplatePack {
            name: raw.name,
            revision: raw.revision,
            variables: raw.variables,
            files,
        };
        validate(&pack)?;

        debug!(
            template = %pack.name,
            revision = pack.revision,
            files = pack.files.len(),
            "template pack loaded"
        );
        Ok(pack)
    }

    /// Run load-time validation against an in-memory pack
    ///
    /// Exposed so callers that build packs programmatically get the same
    /// guarantees as disk loading.
    pub fn validate_pack(pack: &TemplatePack) -> Result<(), EngineError> {
        validate(pack)
    }
}

/// Read every payload file under `tree/`, keyed by slash-separated relative path
fn read_tree(tree_dir: &Path) -> Result<BTreeMap<String, String>, EngineError> {
    let mut bodies = BTreeMap::new();
    if !tree_dir.exists() {
        return Ok(bodies);
    }

    for entry in WalkDir::new(tree_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            EngineError::Pack(format!("cannot walk {}: {}", tree_dir.display(), e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(tree_dir)
            .expect("walkdir stays under its root");
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let body = fs::read_to_string(entry.path()).map_err(|e| {
            EngineError::Pack(format!("cannot read {}: {}", entry.path().display(), e))
        })?;
        bodies.insert(key, body);
    }
    Ok(bodies)
}

/// Merge implicit tree rules with the manifest's `files:` entries
fn assemble_rules(
    raw: &RawPack,
    bodies: BTreeMap<String, String>,
) -> Result<Vec<FileRule>, EngineError> {
    let mut overrides: BTreeMap<&str, &RawFileRule> = BTreeMap::new();
    let mut inline: Vec<&RawFileRule> = Vec::new();

    for rule in &raw.files {
        match (&rule.source, &rule.content) {
            (Some(source), None) => {
                if !bodies.contains_key(source.as_str()) {
                    return Err(EngineError::Pack(format!(
                        "files entry refers to `{}` which does not exist under {}/",
                        source, PACK_TREE
                    )));
                }
                if overrides.insert(source.as_str(), rule).is_some() {
                    return Err(EngineError::Pack(format!(
                        "duplicate files entry for `{}`",
                        source
                    )));
                }
            }
            (None, Some(_)) => {
                if rule.path.is_none() {
                    return Err(EngineError::Pack(
                        "inline files entry is missing `path`".to_string(),
                    ));
                }
                inline.push(rule);
            }
            (Some(source), Some(_)) => {
                return Err(EngineError::Pack(format!(
                    "files entry for `{}` has both `source` and `content`",
                    source
                )));
            }
            (None, None) => {
                return Err(EngineError::Pack(
                    "files entry needs either `source` or `content`".to_string(),
                ));
            }
        }
    }

    let mut rules = Vec::new();
    for (source, body) in bodies {
        let rule = overrides.get(source.as_str());
        rules.push(FileRule {
            path: rule
                .and_then(|r| r.path.clone())
                .unwrap_or_else(|| source.clone()),
            content: body,
            when: rule.and_then(|r| r.when.clone()),
            category: rule.and_then(|r| r.category).unwrap_or_default(),
        });
    }
    for rule in inline {
        rules.push(FileRule {
            path: rule.path.clone().expect("inline rules carry a path"),
            content: rule.content.clone().unwrap_or_default(),
            when: rule.when.clone(),
            category: rule.category.unwrap_or_default(),
        });
    }
    Ok(rules)
}

fn validate(pack: &TemplatePack) -> Result<(), EngineError> {
    let mut declared: BTreeSet<&str> = BTreeSet::new();
    for def in &pack.variables {
        if !declared.insert(def.name.as_str()) {
            return Err(EngineError::Pack(format!(
                "variable `{}` is declared twice",
                def.name
            )));
        }
        validate_variable(def)?;
    }

    let mut seen_paths: BTreeSet<&str> = BTreeSet::new();
    for rule in &pack.files {
        if !seen_paths.insert(rule.path.as_str()) {
            return Err(EngineError::Pack(format!(
                "two rules declare the output path `{}`",
                rule.path
            )));
        }
        validate_rule(rule, &declared)?;
    }

    // Derivation references are template references too; check them against
    // the declared set so a broken derivation fails at load, not at resolve.
    for def in &pack.variables {
        if let Some(derivation) = &def.derived {
            check_references(derivation, &declared, &format!("variable `{}`", def.name))?;
        }
    }

    Ok(())
}

fn validate_variable(def: &VariableDef) -> Result<(), EngineError> {
    if def.derived.is_some() && def.default.is_some() {
        return Err(EngineError::Pack(format!(
            "variable `{}` cannot have both `derived` and `default`",
            def.name
        )));
    }
    match def.kind {
        VarKind::Enum => {
            if def.choices.is_empty() {
                return Err(EngineError::Pack(format!(
                    "enum variable `{}` has no choices",
                    def.name
                )));
            }
            if let Some(default) = &def.default {
                if !def.choices.contains(default) {
                    return Err(EngineError::Pack(format!(
                        "default `{}` of variable `{}` is not among its choices",
                        default, def.name
                    )));
                }
            }
        }
        VarKind::Bool => {
            if let Some(default) = &def.default {
                if parse_bool(default).is_none() {
                    return Err(EngineError::Pack(format!(
                        "default `{}` of bool variable `{}` is not a boolean",
                        default, def.name
                    )));
                }
            }
        }
        VarKind::String => {
            if let Some(pattern) = &def.pattern {
                regex::Regex::new(pattern).map_err(|e| {
                    EngineError::Pack(format!(
                        "variable `{}` has an invalid pattern: {}",
                        def.name, e
                    ))
                })?;
            }
        }
    }
    if !def.choices.is_empty() && def.kind != VarKind::Enum {
        return Err(EngineError::Pack(format!(
            "variable `{}` has choices but is not an enum",
            def.name
        )));
    }
    Ok(())
}

fn validate_rule(rule: &FileRule, declared: &BTreeSet<&str>) -> Result<(), EngineError> {
    check_references(&rule.path, declared, &format!("path of `{}`", rule.path))?;
    check_references(
        &rule.content,
        declared,
        &format!("content of `{}`", rule.path),
    )?;
    if let Some(when) = &rule.when {
        let expr = Expr::parse(when)?;
        let mut vars = BTreeSet::new();
        expr.variables(&mut vars);
        for name in vars {
            if !declared.contains(name.as_str()) {
                return Err(EngineError::UnresolvedVariable {
                    variable: name,
                    location: format!("condition of `{}`", rule.path),
                });
            }
        }
    }
    Ok(())
}

/// Parse a template and reject references to undeclared variables
fn check_references(
    template: &str,
    declared: &BTreeSet<&str>,
    location: &str,
) -> Result<(), EngineError> {
    let elements = TemplateParser::parse(template)?;
    let mut vars = BTreeSet::new();
    TemplateParser::variables(&elements, &mut vars);
    for name in vars {
        if !declared.contains(name.as_str()) {
            return Err(EngineError::UnresolvedVariable {
                variable: name,
                location: location.to_string(),
            });
        }
    }
    Ok(())
}
