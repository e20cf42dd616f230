//! Persisted generation manifest
//!
//! The manifest is the only long-lived state the engine keeps. It is written
//! at first generation, read and rewritten at every update, and never
//! consulted during day-to-day use of the generated project. The recorded
//! hash for a path always equals the content actually written at the time it
//! was last (re)written, except for user-protected files deliberately left
//! untouched.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{error::EngineError, policy::FileCategory};

/// Directory holding the manifest inside a generated project
pub const MANIFEST_DIR: &str = ".stencil";
/// Manifest file name
pub const MANIFEST_FILE: &str = "manifest.json";
/// Newest manifest schema this engine reads and writes
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// SHA-256 content hash, hex encoded
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Per-path record of what was last written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Hash of the content at the time it was last (re)written
    pub hash: String,
    /// Category the path had when last written; consulted when a template
    /// revision reclassifies a file
    pub category: FileCategory,
}

/// Persisted record of one generated project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectManifest {
    /// Manifest schema version, for future reconciliation changes
    pub schema_version: u32,
    /// Template identity
    pub template: String,
    /// Template revision used for the last generation or update
    pub revision: u64,
    /// Raw (non-derived) answers used; derived values are recomputed
    pub answers: BTreeMap<String, String>,
    /// Per output path, the record of the last write
    pub files: BTreeMap<String, FileRecord>,
    /// When the project was first generated
    pub generated_at: DateTime<Utc>,
    /// When the project was last generated or updated
    pub updated_at: DateTime<Utc>,
}

impl ProjectManifest {
    /// Create a fresh manifest for a first generation
    pub fn new(template: &str, revision: u64, answers: BTreeMap<String, String>) -> Self {
        let now = Utc::now();
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION,
            template: template.to_string(),
            revision,
            answers,
            files: BTreeMap::new(),
            generated_at: now,
            updated_at: now,
        }
    }

    /// Path of the manifest file inside a project directory
    pub fn path_in(project_dir: &Path) -> PathBuf {
        project_dir.join(MANIFEST_DIR).join(MANIFEST_FILE)
    }

    /// Whether a project directory has a manifest
    pub fn exists_in(project_dir: &Path) -> bool {
        Self::path_in(project_dir).exists()
    }

    /// Load the manifest of a previously generated project
    pub fn load(project_dir: &Path) -> Result<Self, EngineError> {
        let path = Self::path_in(project_dir);
        let data = fs::read_to_string(&path).map_err(|e| {
            EngineError::Manifest(format!(
                "cannot read {}: {} (was this project generated by stencil?)",
                path.display(),
                e
            ))
        })?;
        let manifest: ProjectManifest = serde_json::from_str(&data)?;
        if manifest.schema_version > MANIFEST_SCHEMA_VERSION {
            return Err(EngineError::ManifestSchema {
                found: manifest.schema_version,
                supported: MANIFEST_SCHEMA_VERSION,
            });
        }
        Ok(manifest)
    }

    /// Persist the manifest into a project directory
    ///
    /// This is the single serialized step that finalizes a generation or
    /// update; it runs once, after all per-file decisions are known.
    pub fn save(&self, project_dir: &Path) -> Result<(), EngineError> {
        let path = Self::path_in(project_dir);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(&path, data)?;
        Ok(())
    }

    /// Record a write for a path
    pub fn record(&mut self, path: &str, hash: String, category: FileCategory) {
        self.files.insert(path.to_string(), FileRecord { hash, category });
    }

    /// Recorded hash for a path, if any
    pub fn hash_of(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(|record| record.hash.as_str())
    }

    /// Refresh the answers snapshot and revision for an update
    ///
    /// The snapshot stores raw answers only; derived values are a function of
    /// these and the template, so persisting them would let the two drift.
    pub fn refresh(&mut self, revision: u64, raw: BTreeMap<String, String>) {
        self.answers = raw;
        self.revision = revision;
        self.updated_at = Utc::now();
    }
}
