//! Transaction Coordinator (C9, §4.9): applies a batch of file edits
//! atomically, with a write-ahead log for crash recovery and undo/redo
//! stacks for user intent. Planning (matching + computing new bytes) is
//! pure and happens entirely in memory before any file is touched, so a
//! planning failure never requires rolling anything back; only the write
//! phase can partially land, and that is what the WAL protects.

mod diff;
mod types;

pub use types::ApplyOutcome;
pub use types::FileDiff;
pub use types::UndoRedoOutcome;

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use smartctx_chunker::sha256_hex;
use smartctx_config::EditSafetyConfig;
use smartctx_edit::EditDescriptor;
use smartctx_edit::FilePatchKind;
use smartctx_edit::plan_one_with_safety;
use smartctx_error::Error;
use smartctx_error::ErrorCode;
use smartctx_error::Result;
use smartctx_indexer::Indexer;
use smartctx_indexer::resolve_project_path;
use smartctx_store::FileSnapshot;
use smartctx_store::InverseEdit;
use smartctx_store::Store;
use smartctx_store::TransactionLogEntry;
use smartctx_store::TxnState;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

/// Which half of a recorded transaction to replay: the bytes the edit
/// produced (`Forward`, used by `redo`) or the bytes it overwrote
/// (`Backward`, used by `undo`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplaySide {
    Forward,
    Backward,
}

pub struct TransactionCoordinator {
    store: Arc<Store>,
    indexer: Arc<Indexer>,
    project_root: PathBuf,
    edit_safety: EditSafetyConfig,
    /// Serializes every apply/undo/redo so transactions that race are
    /// ordered rather than interleaved (§5).
    edit_mutex: AsyncMutex<()>,
}

impl TransactionCoordinator {
    pub fn new(store: Arc<Store>, indexer: Arc<Indexer>, project_root: PathBuf) -> Self {
        Self::with_edit_safety(store, indexer, project_root, EditSafetyConfig::default())
    }

    pub fn with_edit_safety(store: Arc<Store>, indexer: Arc<Indexer>, project_root: PathBuf, edit_safety: EditSafetyConfig) -> Self {
        Self {
            store,
            indexer,
            project_root,
            edit_safety,
            edit_mutex: AsyncMutex::new(()),
        }
    }

    fn resolve(&self, rel_path: &str) -> Result<PathBuf> {
        resolve_project_path(&self.project_root, rel_path)
            .ok_or_else(|| Error::coded(ErrorCode::SecurityViolation, format!("{rel_path} escapes project root")))
    }

    /// Recovery path to call once at process start, before any command is
    /// accepted (§3). Restores every still-`pending` transaction's files
    /// from their snapshots and resyncs the index for the files touched.
    ///
    /// Snapshot paths are project-relative (they come from `edit.file`, the
    /// same strings `apply_batch` snapshots), so restoring them must go
    /// through `self.resolve` exactly like the forward write does — the
    /// store has no notion of `project_root` and must not guess a cwd.
    pub async fn recover(&self) -> Result<Vec<String>> {
        let pending = self.store.pending_transactions().await?;
        let mut recovered = Vec::with_capacity(pending.len());
        for mut entry in pending {
            for snapshot in &entry.snapshots {
                let abs = self.resolve(&snapshot.path)?;
                let current = tokio::fs::read(&abs).await.ok();
                if current.as_deref() == Some(snapshot.original_bytes.as_slice()) {
                    continue;
                }
                if snapshot.original_hash.is_some() {
                    if let Some(parent) = abs.parent() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                    tokio::fs::write(&abs, &snapshot.original_bytes).await?;
                } else {
                    remove_if_present(&abs).await?;
                }
            }
            entry.state = TxnState::RolledBack;
            self.store.write_transaction(entry.clone()).await?;
            recovered.push(entry.id.clone());

            for snapshot in &entry.snapshots {
                if let Err(e) = self.indexer.ensure_fresh(&snapshot.path).await {
                    tracing::warn!(file = %snapshot.path, error = %e, "reindex after recovery failed");
                }
            }
        }
        Ok(recovered)
    }

    /// `apply_batch` (§4.9): plan every edit in memory first (fails fast,
    /// zero disk writes on any planning error), then write all files,
    /// rolling back any already-written file if a later write fails.
    pub async fn apply_batch(&self, edits: Vec<EditDescriptor>, dry_run: bool) -> Result<ApplyOutcome> {
        let _guard = self.edit_mutex.lock().await;

        let mut abs_paths = Vec::with_capacity(edits.len());
        let mut snapshots = Vec::with_capacity(edits.len());
        let mut inverse_edits = Vec::with_capacity(edits.len());
        let mut diffs = Vec::with_capacity(edits.len());
        let mut new_bytes = Vec::with_capacity(edits.len());

        for edit in &edits {
            let abs = self.resolve(&edit.file)?;

            let current_bytes = match tokio::fs::read(&abs).await {
                Ok(b) => Some(b),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(e.into()),
            };

            if let Some(expected) = &edit.expected_hash {
                let actual = current_bytes.as_deref().map(sha256_hex);
                if actual.as_deref() != Some(expected.as_str()) {
                    return Err(Error::coded(ErrorCode::HashMismatch, format!("expected_hash mismatch for {}", edit.file)));
                }
            }

            let current_text = match &current_bytes {
                Some(b) => Some(
                    std::str::from_utf8(b)
                        .map_err(|_| Error::coded(ErrorCode::EditFailed, format!("{} is not valid UTF-8", edit.file)))?,
                ),
                None => None,
            };

            let patch = plan_one_with_safety(current_text, edit, self.edit_safety.large_delete_bytes, self.edit_safety.large_delete_lines)?;
            let new_text = match &patch.kind {
                FilePatchKind::Create { contents } => contents.clone(),
                FilePatchKind::Delete => String::new(),
                FilePatchKind::Replace { new_contents } => new_contents.clone(),
            };
            let old_text = current_text.unwrap_or("");

            diffs.push(FileDiff {
                file: edit.file.clone(),
                unified_diff: diff::unified_diff(old_text, &new_text, &edit.file),
            });

            let existed_after = !matches!(patch.kind, FilePatchKind::Delete);
            snapshots.push(FileSnapshot {
                path: edit.file.clone(),
                original_bytes: current_bytes.clone().unwrap_or_default(),
                original_hash: current_bytes.as_deref().map(sha256_hex),
            });
            inverse_edits.push(InverseEdit {
                path: edit.file.clone(),
                payload: serde_json::json!({
                    "existed_before": current_bytes.is_some(),
                    "before_hex": current_bytes.as_ref().map(hex::encode),
                    "existed_after": existed_after,
                    "after_hex": existed_after.then(|| hex::encode(new_text.as_bytes())),
                }),
            });
            new_bytes.push(existed_after.then(|| new_text.into_bytes()));
            abs_paths.push(abs);
        }

        let transaction_id = Uuid::new_v4().to_string();

        if dry_run {
            return Ok(ApplyOutcome {
                transaction_id,
                committed: false,
                dry_run: true,
                diffs,
            });
        }

        let started_at = chrono::Utc::now().timestamp_millis();
        self.store
            .write_transaction(TransactionLogEntry {
                id: transaction_id.clone(),
                started_at,
                state: TxnState::Pending,
                snapshots: snapshots.clone(),
                inverse_edits: inverse_edits.clone(),
            })
            .await?;

        if let Err(err) = write_all(&abs_paths, &new_bytes, &snapshots).await {
            self.store
                .write_transaction(TransactionLogEntry {
                    id: transaction_id.clone(),
                    started_at,
                    state: TxnState::RolledBack,
                    snapshots,
                    inverse_edits,
                })
                .await?;
            for edit in &edits {
                if let Err(e) = self.indexer.ensure_fresh(&edit.file).await {
                    tracing::warn!(file = %edit.file, error = %e, "reindex after rollback failed");
                }
            }
            return Err(err);
        }

        self.store
            .write_transaction(TransactionLogEntry {
                id: transaction_id.clone(),
                started_at,
                state: TxnState::Committed,
                snapshots,
                inverse_edits,
            })
            .await?;
        self.store.push_undo(transaction_id.clone()).await?;
        self.store.clear_redo().await?;

        for edit in &edits {
            if let Err(e) = self.indexer.ensure_fresh(&edit.file).await {
                tracing::warn!(file = %edit.file, error = %e, "reindex after edit failed");
            }
        }

        Ok(ApplyOutcome {
            transaction_id,
            committed: true,
            dry_run: false,
            diffs,
        })
    }

    /// Pops the undo stack and applies the transaction's pre-edit bytes as
    /// a new committed transaction, pushing the original transaction id
    /// onto the redo stack (§4.9).
    pub async fn undo(&self) -> Result<UndoRedoOutcome> {
        let _guard = self.edit_mutex.lock().await;
        let Some(txn_id) = self.store.pop_undo().await? else {
            return Err(Error::coded(ErrorCode::EditFailed, "nothing to undo"));
        };
        let entry = self
            .store
            .get_transaction(&txn_id)
            .await?
            .ok_or_else(|| Error::coded(ErrorCode::InternalError, format!("undo stack referenced unknown transaction {txn_id}")))?;
        let new_id = self.replay(&entry, ReplaySide::Backward).await?;
        self.store.push_redo(txn_id).await?;
        Ok(UndoRedoOutcome {
            transaction_id: new_id,
            files: entry.inverse_edits.iter().map(|i| i.path.clone()).collect(),
        })
    }

    /// Pops the redo stack and reapplies the transaction's post-edit bytes
    /// as a new committed transaction, pushing the original id back onto
    /// the undo stack (§4.9).
    pub async fn redo(&self) -> Result<UndoRedoOutcome> {
        let _guard = self.edit_mutex.lock().await;
        let Some(txn_id) = self.store.pop_redo().await? else {
            return Err(Error::coded(ErrorCode::EditFailed, "nothing to redo"));
        };
        let entry = self
            .store
            .get_transaction(&txn_id)
            .await?
            .ok_or_else(|| Error::coded(ErrorCode::InternalError, format!("redo stack referenced unknown transaction {txn_id}")))?;
        let new_id = self.replay(&entry, ReplaySide::Forward).await?;
        self.store.push_undo(txn_id).await?;
        Ok(UndoRedoOutcome {
            transaction_id: new_id,
            files: entry.inverse_edits.iter().map(|i| i.path.clone()).collect(),
        })
    }

    /// Replays one side of a recorded transaction's byte pairs as a brand
    /// new WAL-tracked transaction, so every undo/redo is itself crash-safe
    /// and itself undoable.
    async fn replay(&self, entry: &TransactionLogEntry, side: ReplaySide) -> Result<String> {
        let (exists_key, hex_key) = match side {
            ReplaySide::Forward => ("existed_after", "after_hex"),
            ReplaySide::Backward => ("existed_before", "before_hex"),
        };

        let mut abs_paths = Vec::with_capacity(entry.inverse_edits.len());
        let mut targets = Vec::with_capacity(entry.inverse_edits.len());
        for inv in &entry.inverse_edits {
            let abs = self.resolve(&inv.path)?;
            let existed = inv.payload.get(exists_key).and_then(|v| v.as_bool()).unwrap_or(false);
            let bytes = if existed {
                let hex_str = inv
                    .payload
                    .get(hex_key)
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| Error::coded(ErrorCode::InternalError, "corrupt transaction log entry"))?;
                Some(hex::decode(hex_str).map_err(|_| Error::coded(ErrorCode::InternalError, "corrupt transaction log hex"))?)
            } else {
                None
            };
            abs_paths.push(abs);
            targets.push(bytes);
        }

        let mut snapshots = Vec::with_capacity(abs_paths.len());
        let mut new_inverse = Vec::with_capacity(abs_paths.len());
        for ((abs, target), inv) in abs_paths.iter().zip(targets.iter()).zip(entry.inverse_edits.iter()) {
            let current = tokio::fs::read(abs).await.ok();
            snapshots.push(FileSnapshot {
                path: inv.path.clone(),
                original_bytes: current.clone().unwrap_or_default(),
                original_hash: current.as_deref().map(sha256_hex),
            });
            new_inverse.push(InverseEdit {
                path: inv.path.clone(),
                payload: serde_json::json!({
                    "existed_before": current.is_some(),
                    "before_hex": current.as_ref().map(hex::encode),
                    "existed_after": target.is_some(),
                    "after_hex": target.as_ref().map(hex::encode),
                }),
            });
        }

        let new_id = Uuid::new_v4().to_string();
        let started_at = chrono::Utc::now().timestamp_millis();
        self.store
            .write_transaction(TransactionLogEntry {
                id: new_id.clone(),
                started_at,
                state: TxnState::Pending,
                snapshots: snapshots.clone(),
                inverse_edits: new_inverse.clone(),
            })
            .await?;

        if let Err(err) = write_all(&abs_paths, &targets, &snapshots).await {
            self.store
                .write_transaction(TransactionLogEntry {
                    id: new_id.clone(),
                    started_at,
                    state: TxnState::RolledBack,
                    snapshots,
                    inverse_edits: new_inverse,
                })
                .await?;
            return Err(err);
        }

        self.store
            .write_transaction(TransactionLogEntry {
                id: new_id.clone(),
                started_at,
                state: TxnState::Committed,
                snapshots,
                inverse_edits: new_inverse,
            })
            .await?;

        for inv in &entry.inverse_edits {
            if let Err(e) = self.indexer.ensure_fresh(&inv.path).await {
                tracing::warn!(file = %inv.path, error = %e, "reindex after undo/redo failed");
            }
        }

        Ok(new_id)
    }
}

/// Writes every `(path, bytes)` pair in order (`None` bytes means delete).
/// On the first failure, restores every already-written path from its
/// snapshot and returns the triggering error; already-restored paths are
/// left untouched (§8 property 4).
async fn write_all(paths: &[PathBuf], targets: &[Option<Vec<u8>>], snapshots: &[FileSnapshot]) -> Result<()> {
    let mut written = 0usize;
    let mut failure: Option<std::io::Error> = None;

    for (i, (abs, target)) in paths.iter().zip(targets.iter()).enumerate() {
        let res = match target {
            Some(bytes) => {
                if let Some(parent) = abs.parent() {
                    if let Err(e) = tokio::fs::create_dir_all(parent).await {
                        failure = Some(e);
                        break;
                    }
                }
                tokio::fs::write(abs, bytes).await
            }
            None => remove_if_present(abs).await,
        };
        match res {
            Ok(()) => written = i + 1,
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    let Some(failure) = failure else { return Ok(()) };

    for (abs, snapshot) in paths[..written].iter().zip(snapshots[..written].iter()) {
        let restore = if snapshot.original_hash.is_some() {
            tokio::fs::write(abs, &snapshot.original_bytes).await
        } else {
            remove_if_present(abs).await
        };
        if let Err(e) = restore {
            tracing::error!(path = %abs.display(), error = %e, "failed to restore snapshot during rollback");
        }
    }

    Err(Error::coded(ErrorCode::InternalError, format!("write failed: {failure}")))
}

async fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartctx_edit::EditOperation;
    use smartctx_graph::DependencyGraph;
    use std::sync::Arc;

    fn base_edit(file: &str, op: EditOperation) -> EditDescriptor {
        EditDescriptor {
            file: file.to_string(),
            operation: op,
            target_string: None,
            replacement_string: None,
            line_range: None,
            before_context: None,
            after_context: None,
            fuzzy_mode: None,
            anchor_search_range: None,
            expected_hash: None,
            insert_mode: None,
            insert_line_range: None,
            confirmation_hash: None,
            safety_level: Default::default(),
        }
    }

    async fn harness() -> (tempfile::TempDir, TransactionCoordinator) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open_in_memory().unwrap());
        let graph = Arc::new(DependencyGraph::new(store.clone()));
        let indexer = Arc::new(Indexer::new(store.clone(), graph, dir.path().to_path_buf()));
        let coord = TransactionCoordinator::new(store, indexer, dir.path().to_path_buf());
        (dir, coord)
    }

    #[tokio::test]
    async fn s3_second_edit_failure_rolls_back_first() {
        let (dir, coord) = harness().await;
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("b.txt"), "world").unwrap();

        let mut edit_a = base_edit("a.txt", EditOperation::Replace);
        edit_a.target_string = Some("hello".into());
        edit_a.replacement_string = Some("HELLO".into());

        let mut edit_b = base_edit("b.txt", EditOperation::Replace);
        edit_b.target_string = Some("WORLD".into());
        edit_b.replacement_string = Some("x".into());

        let err = coord.apply_batch(vec![edit_a, edit_b], false).await.unwrap_err();
        assert_eq!(err.code(), smartctx_error::ErrorCode::EditFailed);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "hello");
        assert_eq!(std::fs::read_to_string(dir.path().join("b.txt")).unwrap(), "world");
    }

    #[tokio::test]
    async fn s4_undo_then_redo_restores_post_edit_state() {
        let (dir, coord) = harness().await;
        std::fs::write(dir.path().join("a.txt"), "foo").unwrap();

        let mut edit = base_edit("a.txt", EditOperation::Replace);
        edit.target_string = Some("foo".into());
        edit.replacement_string = Some("bar".into());
        coord.apply_batch(vec![edit], false).await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "bar");

        coord.undo().await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "foo");

        coord.redo().await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "bar");
    }

    #[tokio::test]
    async fn dry_run_never_writes_or_touches_stacks() {
        let (dir, coord) = harness().await;
        std::fs::write(dir.path().join("a.txt"), "foo").unwrap();

        let mut edit = base_edit("a.txt", EditOperation::Replace);
        edit.target_string = Some("foo".into());
        edit.replacement_string = Some("bar".into());
        let outcome = coord.apply_batch(vec![edit], true).await.unwrap();
        assert!(outcome.dry_run);
        assert!(!outcome.committed);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "foo");
        assert!(coord.undo().await.is_err());
    }

    #[tokio::test]
    async fn create_then_undo_removes_the_file() {
        let (dir, coord) = harness().await;
        let mut edit = base_edit("new.txt", EditOperation::Create);
        edit.replacement_string = Some("hi\n".into());
        coord.apply_batch(vec![edit], false).await.unwrap();
        assert!(dir.path().join("new.txt").exists());

        coord.undo().await.unwrap();
        assert!(!dir.path().join("new.txt").exists());
    }

    #[tokio::test]
    async fn recover_restores_snapshot_against_project_root_not_cwd() {
        let (dir, coord) = harness().await;
        std::fs::write(dir.path().join("a.txt"), "half-written").unwrap();

        // Simulate a crash mid-`apply_batch`: a `pending` WAL entry whose
        // snapshot holds the pre-edit bytes, written directly to the store
        // the way `apply_batch` would have before the process died.
        coord
            .store
            .write_transaction(TransactionLogEntry {
                id: "crash-txn".to_string(),
                started_at: 0,
                state: TxnState::Pending,
                snapshots: vec![FileSnapshot {
                    path: "a.txt".to_string(),
                    original_bytes: b"hello".to_vec(),
                    original_hash: Some(sha256_hex(b"hello")),
                }],
                inverse_edits: vec![],
            })
            .await
            .unwrap();

        let recovered = coord.recover().await.unwrap();
        assert_eq!(recovered, vec!["crash-txn".to_string()]);

        // The snapshot path ("a.txt") is project-relative; recovery must
        // resolve it against `project_root` (here, `dir.path()`), not the
        // process's current working directory.
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "hello");

        let entry = coord.store.get_transaction("crash-txn").await.unwrap().unwrap();
        assert_eq!(entry.state, TxnState::RolledBack);
    }

    #[tokio::test]
    async fn path_escaping_project_root_is_rejected() {
        let (_dir, coord) = harness().await;
        let mut edit = base_edit("../outside.txt", EditOperation::Create);
        edit.replacement_string = Some("x".into());
        let err = coord.apply_batch(vec![edit], false).await.unwrap_err();
        assert_eq!(err.code(), smartctx_error::ErrorCode::SecurityViolation);
    }
}
