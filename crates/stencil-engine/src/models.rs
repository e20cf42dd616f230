//! Core data models for scaffolding

use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::policy::FileCategory;

/// Declared type of a template variable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarKind {
    /// Free-form string value
    #[default]
    String,
    /// Boolean value, stored as `"true"` / `"false"`
    Bool,
    /// One of a closed set of choices
    Enum,
}

/// Definition of a single template variable
///
/// A variable is either answered by the user (possibly falling back to
/// `default`) or derived from other variables via a template expression.
/// Derivation references must form a DAG; cycles are rejected before any
/// rendering happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDef {
    /// Variable name, the key used in placeholders and conditions
    pub name: String,
    /// Declared type
    #[serde(default)]
    pub kind: VarKind,
    /// Default value used when no answer is supplied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Valid choices; only meaningful for `kind: enum`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    /// Regex the raw answer must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Template expression computing this variable from earlier ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived: Option<String>,
    /// Question shown in interactive mode instead of the bare name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl VariableDef {
    /// Whether the user must supply an answer for this variable
    pub fn is_required(&self) -> bool {
        self.derived.is_none() && self.default.is_none()
    }
}

/// One renderable entry of a template pack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRule {
    /// Output path expression, relative to the project root
    pub path: String,
    /// Content template; the pack loader fills this from the body file when
    /// the rule is not inline
    #[serde(default)]
    pub content: String,
    /// Inclusion condition over variable names; absent means always included
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    /// Mutability category governing generation and update behavior
    #[serde(default)]
    pub category: FileCategory,
}

/// A fully loaded, validated template pack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatePack {
    /// Template identity, recorded into every generated manifest
    pub name: String,
    /// Monotonic template revision
    pub revision: u64,
    /// Declared variables, in authoring order
    #[serde(default)]
    pub variables: Vec<VariableDef>,
    /// Renderable entries
    #[serde(default)]
    pub files: Vec<FileRule>,
}

impl TemplatePack {
    /// Look up a variable definition by name
    pub fn variable(&self, name: &str) -> Option<&VariableDef> {
        self.variables.iter().find(|v| v.name == name)
    }
}

/// Resolved, immutable variable environment for one generation or update
///
/// Created once per invocation by the resolver and never mutated afterwards;
/// every later stage reads it through shared references, which is what makes
/// parallel rendering safe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSet {
    values: BTreeMap<String, String>,
}

impl AnswerSet {
    /// Build an answer set from already-resolved values
    pub fn from_values(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    /// Look up a resolved value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Truthiness of a variable for condition evaluation
    ///
    /// The empty string and `"false"` are false; any other value is true.
    /// An absent variable is false, but conditions over undeclared variables
    /// never reach evaluation: they are rejected at pack load time.
    pub fn truthy(&self, name: &str) -> bool {
        match self.get(name) {
            Some(value) => !value.is_empty() && value != "false",
            None => false,
        }
    }

    /// Whether a value exists for `name`
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Iterate over resolved `(name, value)` pairs in deterministic order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of resolved variables
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Snapshot of the underlying map, used for manifest persistence
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.values.clone()
    }
}

/// In-memory result of rendering one included file rule
///
/// Exists only in memory until the orchestrator commits the whole set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    /// Concrete output path, relative to the project root
    pub path: PathBuf,
    /// Concrete rendered content
    pub content: String,
    /// Category inherited from the originating rule
    pub category: FileCategory,
    /// Path expression of the originating rule, kept for diagnostics
    pub rule_path: String,
}
