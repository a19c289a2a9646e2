//! `manage_project` (§4.11): administrative commands over the transaction
//! coordinator (C9) and the indexer (C3).

use serde::Deserialize;
use serde::Serialize;
use smartctx_error::Result;
use smartctx_indexer::IndexStats;
use smartctx_store::TxnState;
use smartctx_txn::UndoRedoOutcome;

use crate::app::App;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManageCommand {
    Undo,
    Redo,
    Status,
    Reindex,
    History,
}

#[derive(Debug, Deserialize)]
pub struct ManageProjectArgs {
    pub command: ManageCommand,
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    20
}

/// A history entry summarized for the wire: the full [`TransactionLogEntry`]
/// carries raw snapshot bytes, which no caller of `manage_project` needs.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub id: String,
    pub started_at: i64,
    pub state: TxnState,
    pub files: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ManageProjectData {
    UndoRedo(UndoRedoOutcome),
    Status { undo_depth: u64, redo_depth: u64 },
    Reindex(IndexStats),
    History { transactions: Vec<HistoryEntry> },
}

pub async fn manage_project(app: &App, args: ManageProjectArgs) -> Result<ManageProjectData> {
    match args.command {
        ManageCommand::Undo => Ok(ManageProjectData::UndoRedo(app.txn.undo().await?)),
        ManageCommand::Redo => Ok(ManageProjectData::UndoRedo(app.txn.redo().await?)),
        ManageCommand::Status => {
            let undo_depth = app.store.undo_depth().await?;
            let redo_depth = app.store.redo_depth().await?;
            Ok(ManageProjectData::Status { undo_depth, redo_depth })
        }
        ManageCommand::Reindex => {
            let stats = app.indexer.reindex_project().await?;
            app.graph.invalidate();
            Ok(ManageProjectData::Reindex(stats))
        }
        ManageCommand::History => {
            let transactions = app
                .store
                .recent_transactions(args.limit)
                .await?
                .into_iter()
                .map(|e| HistoryEntry {
                    id: e.id,
                    started_at: e.started_at,
                    state: e.state,
                    files: e.snapshots.into_iter().map(|s| s.path).collect(),
                })
                .collect();
            Ok(ManageProjectData::History { transactions })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn harness() -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let app = App::bootstrap(dir.path().to_path_buf()).await.unwrap();
        (dir, app)
    }

    #[tokio::test]
    async fn status_reports_zero_depth_on_fresh_project() {
        let (_dir, app) = harness().await;
        let data = manage_project(&app, ManageProjectArgs { command: ManageCommand::Status, limit: 20 }).await.unwrap();
        match data {
            ManageProjectData::Status { undo_depth, redo_depth } => {
                assert_eq!(undo_depth, 0);
                assert_eq!(redo_depth, 0);
            }
            _ => panic!("expected status"),
        }
    }

    #[tokio::test]
    async fn undo_with_empty_stack_fails() {
        let (_dir, app) = harness().await;
        let err = manage_project(&app, ManageProjectArgs { command: ManageCommand::Undo, limit: 20 }).await.unwrap_err();
        assert_eq!(err.code(), smartctx_error::ErrorCode::EditFailed);
    }

    #[tokio::test]
    async fn reindex_runs_clean_on_empty_project() {
        let (_dir, app) = harness().await;
        let data = manage_project(&app, ManageProjectArgs { command: ManageCommand::Reindex, limit: 20 }).await.unwrap();
        match data {
            ManageProjectData::Reindex(stats) => assert_eq!(stats.files_removed, 0),
            _ => panic!("expected reindex"),
        }
    }

    #[tokio::test]
    async fn history_is_empty_on_fresh_project() {
        let (_dir, app) = harness().await;
        let data = manage_project(&app, ManageProjectArgs { command: ManageCommand::History, limit: 20 }).await.unwrap();
        match data {
            ManageProjectData::History { transactions } => assert!(transactions.is_empty()),
            _ => panic!("expected history"),
        }
    }
}
