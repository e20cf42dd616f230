//! Three-way update reconciliation
//!
//! For every file carried across an update there are three content values:
//! O, the content previously generated (identified by the manifest's recorded
//! hash); N, the newly rendered content; and D, what is currently on disk.
//! [`decide`] classifies one file into a terminal state:
//!
//! | state | outcome |
//! |---|---|
//! | D == N | already converged, no-op |
//! | D == O | fast-forward, write N |
//! | N == O | user edited, template unchanged, leave D |
//! | all differ | three-way conflict |
//!
//! [`plan_update`] layers the mutability category on top: `AlwaysUpdate`
//! resolves conflicts in favor of N by design, `ProtectedOnce` leaves D alone
//! and raises a [`ConflictRecord`]. Conflicting content is never merged
//! automatically; it is materialized as a `<path>.new` side file or as
//! conflict markers, per configuration, for the operator to resolve. A
//! conflict on one file never blocks processing of the rest.

use std::{fs, io, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    manifest::FileRecord,
    policy::{self, Disposition, FileCategory},
};

/// How conflicting content is surfaced to the operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStyle {
    /// Write the new render next to the file as `<path>.new`
    #[default]
    SideFile,
    /// Rewrite the file with `<<<<<<<` / `>>>>>>>` markers around both versions
    Markers,
}

/// A reconciliation outcome requiring human resolution
///
/// Transient: produced during reconciliation, surfaced in the final report,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Project-relative path of the conflicting file
    pub path: String,
    /// Hash of O, the content recorded at last generation
    pub ancestor: String,
    /// Hash of N, the newly rendered content
    pub incoming: String,
    /// Hash of D, the content on disk; `None` when the user deleted the file
    pub local: Option<String>,
}

/// Terminal state of the three-way comparison for one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// D == N: nothing to do
    Converged,
    /// D == O: the user never touched the file, apply the template's change
    FastForward,
    /// N == O: the template didn't change, keep the user's edit
    KeepLocal,
    /// O, N, and D all differ
    Conflict,
}

/// Classify one file from its three content hashes
///
/// `local` is `None` when the file is absent from disk.
pub fn decide(ancestor: &str, incoming: &str, local: Option<&str>) -> Decision {
    match local {
        None => Decision::FastForward,
        Some(local) => {
            if local == incoming {
                Decision::Converged
            } else if local == ancestor {
                Decision::FastForward
            } else if incoming == ancestor {
                Decision::KeepLocal
            } else {
                Decision::Conflict
            }
        }
    }
}

/// What the orchestrator should do with one file during an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateAction {
    /// Write N and record its hash
    WriteIncoming,
    /// Keep D; the recorded hash stays what it was
    LeaveLocal,
    /// Content already equals N; refresh the recorded hash without writing
    Noop,
    /// Keep D (or keep the path absent), materialize N, emit a ConflictRecord
    RaiseConflict,
    /// Leave the path untouched but record N's hash as the new baseline
    RecordOnly,
    /// The user deleted a protected file and the template didn't change it
    SkipAbsent,
}

/// Decide the update action for one rendered file
///
/// `recorded` is the manifest entry from the previous generation, absent for
/// paths new in this template revision. When the template reclassifies a path
/// (its category differs from the recorded one), the file is re-baselined
/// under the new category instead of inheriting the old category's history.
pub fn plan_update(
    category: FileCategory,
    recorded: Option<&FileRecord>,
    incoming_hash: &str,
    local_hash: Option<&str>,
) -> UpdateAction {
    let record = match recorded {
        // Path is new in this revision: follow first-generation policy.
        None => {
            return match local_hash {
                None => UpdateAction::WriteIncoming,
                Some(local) if local == incoming_hash => UpdateAction::Noop,
                Some(_) => match policy::first_generation(category, true) {
                    Disposition::Write => UpdateAction::WriteIncoming,
                    Disposition::SkipExisting => UpdateAction::RecordOnly,
                },
            };
        }
        Some(record) => record,
    };

    if record.category != category {
        return rebaseline(category, record, incoming_hash, local_hash);
    }

    match local_hash {
        // The user deleted the file.
        None => match category {
            FileCategory::AlwaysUpdate => UpdateAction::WriteIncoming,
            FileCategory::ProtectedOnce => {
                if incoming_hash == record.hash {
                    UpdateAction::SkipAbsent
                } else {
                    UpdateAction::RaiseConflict
                }
            }
            FileCategory::Never => UpdateAction::SkipAbsent,
        },
        Some(local) => match decide(&record.hash, incoming_hash, Some(local)) {
            Decision::Converged => UpdateAction::Noop,
            Decision::FastForward => UpdateAction::WriteIncoming,
            Decision::KeepLocal => UpdateAction::LeaveLocal,
            Decision::Conflict => match category {
                // User edits to AlwaysUpdate files are discarded by design.
                FileCategory::AlwaysUpdate => UpdateAction::WriteIncoming,
                _ => UpdateAction::RaiseConflict,
            },
        },
    }
}

/// First update after a category change re-establishes a baseline
fn rebaseline(
    category: FileCategory,
    record: &FileRecord,
    incoming_hash: &str,
    local_hash: Option<&str>,
) -> UpdateAction {
    match category {
        FileCategory::AlwaysUpdate => match local_hash {
            Some(local) if local == incoming_hash => UpdateAction::Noop,
            _ => UpdateAction::WriteIncoming,
        },
        FileCategory::ProtectedOnce => match local_hash {
            None => {
                if incoming_hash == record.hash {
                    UpdateAction::SkipAbsent
                } else {
                    UpdateAction::RaiseConflict
                }
            }
            Some(local) if local == incoming_hash => UpdateAction::Noop,
            Some(_) => UpdateAction::RaiseConflict,
        },
        FileCategory::Never => UpdateAction::SkipAbsent,
    }
}

/// Materialize a conflict on disk without losing either version
///
/// Side-file style writes N to `<path>.new` and leaves the file untouched.
/// Marker style rewrites the file embedding both versions between markers;
/// when the local file is absent the side file is written instead. Returns
/// the path that was written.
pub fn materialize_conflict(
    target: &Path,
    incoming: &str,
    style: ConflictStyle,
) -> io::Result<PathBuf> {
    match style {
        ConflictStyle::SideFile => write_side_file(target, incoming),
        ConflictStyle::Markers => {
            let local = match fs::read_to_string(target) {
                Ok(content) => content,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return write_side_file(target, incoming);
                }
                Err(e) => return Err(e),
            };
            let merged = format!(
                "<<<<<<< local\n{}\n=======\n{}\n>>>>>>> template\n",
                local.trim_end_matches('\n'),
                incoming.trim_end_matches('\n'),
            );
            fs::write(target, merged)?;
            Ok(target.to_path_buf())
        }
    }
}

fn write_side_file(target: &Path, incoming: &str) -> io::Result<PathBuf> {
    let side_path = PathBuf::from(format!("{}.new", target.display()));
    if let Some(parent) = side_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&side_path, incoming)?;
    Ok(side_path)
}
