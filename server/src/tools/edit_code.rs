//! `edit_code` (§4.11): dispatches a batch of edits to the transaction
//! coordinator (C9) and decorates the response with an impact preview
//! (C10). Impact never blocks a transaction unless the caller opts in via
//! `require_low_risk` (§4.10).

use serde::Deserialize;
use serde::Serialize;
use smartctx_edit::EditDescriptor;
use smartctx_error::Error;
use smartctx_error::ErrorCode;
use smartctx_error::Result;
use smartctx_impact::ImpactReport;
use smartctx_impact::RiskLevel;
use smartctx_txn::ApplyOutcome;

use crate::app::App;

#[derive(Debug, Deserialize)]
pub struct EditCodeArgs {
    pub edits: Vec<EditDescriptor>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub diff_mode: bool,
    #[serde(default)]
    pub require_low_risk: bool,
}

#[derive(Debug, Serialize)]
pub struct EditCodeData {
    #[serde(flatten)]
    pub outcome: ApplyOutcome,
    pub impact: ImpactReport,
}

pub async fn edit_code(app: &App, args: EditCodeArgs) -> Result<EditCodeData> {
    if args.edits.is_empty() {
        return Err(Error::coded(ErrorCode::MissingParameter, "edit_code requires a non-empty `edits` array"));
    }

    let files: Vec<String> = args.edits.iter().map(|e| e.file.clone()).collect();
    let impact = app.impact.analyze(&files, args.edits.len()).await?;

    if args.require_low_risk && !matches!(impact.risk_level, RiskLevel::Low) && !args.dry_run {
        return Err(Error::coded(
            ErrorCode::EditFailed,
            format!(
                "require_low_risk set but risk_level is {:?} (risk_metric={})",
                impact.risk_level, impact.risk_metric
            ),
        ));
    }

    let outcome = app.txn.apply_batch(args.edits, args.dry_run).await?;
    let outcome = if args.diff_mode {
        outcome
    } else {
        ApplyOutcome { diffs: Vec::new(), ..outcome }
    };

    Ok(EditCodeData { outcome, impact })
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartctx_edit::EditOperation;

    async fn harness() -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let app = App::bootstrap(dir.path().to_path_buf()).await.unwrap();
        (dir, app)
    }

    fn create_edit(file: &str, contents: &str) -> EditDescriptor {
        EditDescriptor {
            file: file.to_string(),
            operation: EditOperation::Create,
            target_string: None,
            replacement_string: Some(contents.to_string()),
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

    #[tokio::test]
    async fn empty_edits_is_missing_parameter() {
        let (_dir, app) = harness().await;
        let err = edit_code(&app, EditCodeArgs { edits: Vec::new(), dry_run: false, diff_mode: false, require_low_risk: false })
            .await
            .unwrap_err();
        assert_eq!(err.code(), smartctx_error::ErrorCode::MissingParameter);
    }

    #[tokio::test]
    async fn create_file_commits_and_reports_low_risk_impact() {
        let (dir, app) = harness().await;
        let data = edit_code(
            &app,
            EditCodeArgs {
                edits: vec![create_edit("new.rs", "fn main() {}\n")],
                dry_run: false,
                diff_mode: true,
                require_low_risk: false,
            },
        )
        .await
        .unwrap();
        assert!(data.outcome.committed);
        assert_eq!(data.impact.risk_level, RiskLevel::Low);
        assert!(dir.path().join("new.rs").exists());
    }

    #[tokio::test]
    async fn diff_mode_off_drops_diffs() {
        let (_dir, app) = harness().await;
        let data = edit_code(
            &app,
            EditCodeArgs {
                edits: vec![create_edit("new2.rs", "fn main() {}\n")],
                dry_run: false,
                diff_mode: false,
                require_low_risk: false,
            },
        )
        .await
        .unwrap();
        assert!(data.outcome.diffs.is_empty());
    }
}
