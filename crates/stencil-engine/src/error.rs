//! Error types for the scaffolding engine

use thiserror::Error;

/// A single rejected answer, produced during answer validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Name of the offending variable
    pub field: String,
    /// What was wrong with the supplied value
    pub message: String,
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors that can occur during generation or update
#[derive(Debug, Error)]
pub enum EngineError {
    /// One or more raw answers failed validation; every violation is listed
    #[error("invalid answers: {}", format_violations(.0))]
    Validation(Vec<FieldViolation>),

    /// Derived variables form a dependency cycle
    #[error("variable dependency cycle involving: {}", .chain.join(" -> "))]
    Cycle {
        /// Variables participating in the cycle, in reference order
        chain: Vec<String>,
    },

    /// A template, condition, or derivation references a variable the pack
    /// never declares; detected at load time, before any answers are read
    #[error("undeclared variable `{variable}` referenced in {location}")]
    UnresolvedVariable {
        /// The undeclared variable name
        variable: String,
        /// Where the reference appears (rule path or variable name)
        location: String,
    },

    /// A variable referenced during rendering is absent from the answer set
    #[error("missing variable `{variable}` while rendering `{path}`")]
    MissingVariable {
        /// The absent variable name
        variable: String,
        /// The file whose render failed
        path: String,
    },

    /// Malformed template text
    #[error("template syntax error at line {line}: {message}")]
    Syntax {
        /// Line number where the error was detected
        line: usize,
        /// Description of the problem
        message: String,
    },

    /// Malformed inclusion condition
    #[error("invalid condition `{expression}`: {message}")]
    Condition {
        /// The offending expression text
        expression: String,
        /// Description of the problem
        message: String,
    },

    /// Two included entries rendered to the same output path
    #[error("path collision: `{first}` and `{second}` both render to `{path}`")]
    PathCollision {
        /// The colliding output path
        path: String,
        /// Path expression of the first entry
        first: String,
        /// Path expression of the second entry
        second: String,
    },

    /// The template pack itself is malformed
    #[error("template pack error: {0}")]
    Pack(String),

    /// The project manifest is missing, unreadable, or inconsistent
    #[error("manifest error: {0}")]
    Manifest(String),

    /// The persisted manifest was written by a newer engine
    #[error("manifest schema version {found} is newer than supported version {supported}")]
    ManifestSchema {
        /// Version found on disk
        found: u32,
        /// Newest version this engine understands
        supported: u32,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest (de)serialization error
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Template pack (de)serialization error
    #[error("pack deserialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn format_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
