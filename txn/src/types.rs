//! Wire-facing shapes returned by the transaction coordinator.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct FileDiff {
    pub file: String,
    pub unified_diff: String,
}

/// Result of `apply_batch`. `dry_run` results never touch the WAL or disk.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutcome {
    pub transaction_id: String,
    pub committed: bool,
    pub dry_run: bool,
    pub diffs: Vec<FileDiff>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UndoRedoOutcome {
    pub transaction_id: String,
    pub files: Vec<String>,
}
