//! File mutability categories and first-generation write policy

use serde::{Deserialize, Serialize};

/// Mutability category of a template file
///
/// The category decides how a file behaves both at first generation and on
/// every later update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    /// Authoring-only material, excluded from any output
    Never,
    /// Written only if absent; protected from updates once the user edits it
    #[serde(rename = "once")]
    ProtectedOnce,
    /// Unconditionally rewritten on every generation or update
    #[default]
    #[serde(rename = "always")]
    AlwaysUpdate,
}

impl FileCategory {
    /// Whether files of this category are rendered at all
    pub fn is_rendered(&self) -> bool {
        !matches!(self, FileCategory::Never)
    }
}

impl std::fmt::Display for FileCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FileCategory::Never => "never",
            FileCategory::ProtectedOnce => "once",
            FileCategory::AlwaysUpdate => "always",
        };
        f.write_str(label)
    }
}

/// What to do with a rendered file during first generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Write the rendered content
    Write,
    /// Leave the existing on-disk file untouched
    SkipExisting,
}

/// First-generation write disposition for a rendered file
///
/// `Never` entries are filtered out before rendering, so this only sees the
/// two writable categories: `ProtectedOnce` respects a pre-existing file,
/// `AlwaysUpdate` does not.
pub fn first_generation(category: FileCategory, exists: bool) -> Disposition {
    match category {
        FileCategory::ProtectedOnce if exists => Disposition::SkipExisting,
        _ => Disposition::Write,
    }
}
