//! Result surface of a generation or update run

use serde::{Deserialize, Serialize};

use crate::reconcile::ConflictRecord;

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    /// Every file landed where the policy wanted it
    Clean,
    /// The run completed but one or more files need manual resolution
    CompletedWithConflicts,
    /// One or more filesystem writes failed
    Failed,
}

/// A filesystem write that failed
///
/// Write failures do not abort the run; the orchestrator keeps writing the
/// remaining independent files and reports the aggregate, so a re-run only
/// has to repair what actually failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteFailure {
    /// Project-relative path of the failed write
    pub path: String,
    /// Underlying error text
    pub message: String,
}

/// Machine-readable result of one generation or update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Paths written this run
    pub written: Vec<String>,
    /// Paths deliberately left untouched (protected or already converged)
    pub skipped: Vec<String>,
    /// Paths recorded in the previous manifest but no longer produced by the
    /// template; left on disk, dropped from the manifest
    pub orphaned: Vec<String>,
    /// Conflicts requiring manual resolution
    pub conflicts: Vec<ConflictRecord>,
    /// Writes that failed
    pub failures: Vec<WriteFailure>,
    /// Whether this was a dry run (nothing touched disk)
    pub dry_run: bool,
}

impl GenerationReport {
    /// Compute the overall status
    ///
    /// Failures dominate conflicts: a failed run must be re-run regardless of
    /// how its conflicts were surfaced, and neither class of discrepancy is
    /// ever dropped from the report.
    pub fn status(&self) -> RunStatus {
        if !self.failures.is_empty() {
            RunStatus::Failed
        } else if !self.conflicts.is_empty() {
            RunStatus::CompletedWithConflicts
        } else {
            RunStatus::Clean
        }
    }

    /// Whether nothing changed on disk
    pub fn is_noop(&self) -> bool {
        self.written.is_empty() && self.conflicts.is_empty() && self.failures.is_empty()
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        format!(
            "{} written, {} skipped, {} conflicts, {} failures{}",
            self.written.len(),
            self.skipped.len(),
            self.conflicts.len(),
            self.failures.len(),
            if self.dry_run { " (dry-run)" } else { "" }
        )
    }
}
