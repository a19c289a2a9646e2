//! Intent Router (C11, §4.11): dispatches one of the six named tools to its
//! handler, parsing raw JSON args into the handler's typed arguments and
//! wrapping the result in the uniform [`Envelope`].

use std::sync::Arc;

use smartctx_error::Error;
use smartctx_error::ErrorCode;

use crate::app::App;
use crate::envelope::Envelope;
use crate::tools::analyze_relationship::AnalyzeRelationshipArgs;
use crate::tools::analyze_relationship::analyze_relationship;
use crate::tools::batch_guidance::BatchGuidanceArgs;
use crate::tools::batch_guidance::get_batch_guidance;
use crate::tools::edit_code::EditCodeArgs;
use crate::tools::edit_code::edit_code;
use crate::tools::manage_project::ManageProjectArgs;
use crate::tools::manage_project::manage_project;
use crate::tools::read_code::ReadCodeArgs;
use crate::tools::read_code::read_code;
use crate::tools::search_project::SearchProjectArgs;
use crate::tools::search_project::search_project;

/// The six user-visible intents, exactly as named in §4.11.
pub const TOOL_NAMES: &[&str] = &[
    "read_code",
    "search_project",
    "analyze_relationship",
    "edit_code",
    "get_batch_guidance",
    "manage_project",
];

pub struct IntentRouter {
    app: Arc<App>,
}

impl IntentRouter {
    pub fn new(app: Arc<App>) -> Self {
        Self { app }
    }

    /// Dispatches `tool` with raw JSON `args`, returning an envelope ready
    /// to serialize onto the wire. Unknown tools and malformed args never
    /// panic — both surface as a coded error inside the envelope.
    pub async fn dispatch(&self, tool: &str, args: serde_json::Value, now_ms: i64) -> Envelope {
        let tool = if crate::schema::legacy_aliases_enabled() {
            crate::schema::canonicalize(tool).unwrap_or(tool)
        } else {
            tool
        };
        match tool {
            "read_code" => Envelope::from_result(self.read_code(args).await),
            "search_project" => Envelope::from_result(self.search_project(args, now_ms).await),
            "analyze_relationship" => Envelope::from_result(self.analyze_relationship(args).await),
            "edit_code" => Envelope::from_result(self.edit_code(args).await),
            "get_batch_guidance" => Envelope::from_result(self.batch_guidance(args).await),
            "manage_project" => Envelope::from_result(self.manage_project(args).await),
            other => Envelope::err(&Error::coded(ErrorCode::MissingParameter, format!("unknown tool `{other}`"))),
        }
    }

    async fn read_code(&self, args: serde_json::Value) -> smartctx_error::Result<serde_json::Value> {
        let args: ReadCodeArgs = parse_args(args)?;
        let data = read_code(&self.app, args).await?;
        to_value(data)
    }

    async fn search_project(&self, args: serde_json::Value, now_ms: i64) -> smartctx_error::Result<serde_json::Value> {
        let args: SearchProjectArgs = parse_args(args)?;
        let data = search_project(&self.app, args, now_ms).await?;
        to_value(data)
    }

    async fn analyze_relationship(&self, args: serde_json::Value) -> smartctx_error::Result<serde_json::Value> {
        let args: AnalyzeRelationshipArgs = parse_args(args)?;
        let data = analyze_relationship(&self.app, args).await?;
        to_value(data)
    }

    async fn edit_code(&self, args: serde_json::Value) -> smartctx_error::Result<serde_json::Value> {
        let args: EditCodeArgs = parse_args(args)?;
        let data = edit_code(&self.app, args).await?;
        to_value(data)
    }

    async fn batch_guidance(&self, args: serde_json::Value) -> smartctx_error::Result<serde_json::Value> {
        let args: BatchGuidanceArgs = parse_args(args)?;
        let data = get_batch_guidance(&self.app, args).await?;
        to_value(data)
    }

    async fn manage_project(&self, args: serde_json::Value) -> smartctx_error::Result<serde_json::Value> {
        let args: ManageProjectArgs = parse_args(args)?;
        let data = manage_project(&self.app, args).await?;
        to_value(data)
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(raw: serde_json::Value) -> smartctx_error::Result<T> {
    serde_json::from_value(raw).map_err(|e| Error::coded(ErrorCode::MissingParameter, format!("invalid arguments: {e}")))
}

fn to_value<T: serde::Serialize>(data: T) -> smartctx_error::Result<serde_json::Value> {
    serde_json::to_value(data).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn harness() -> (tempfile::TempDir, Arc<App>) {
        let dir = tempfile::tempdir().unwrap();
        let app = Arc::new(App::bootstrap(dir.path().to_path_buf()).await.unwrap());
        (dir, app)
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_envelope() {
        let (_dir, app) = harness().await;
        let router = IntentRouter::new(app);
        let envelope = router.dispatch("does_not_exist", serde_json::json!({}), 0).await;
        assert!(!envelope.ok);
        assert!(envelope.error.is_some());
    }

    #[tokio::test]
    async fn read_code_round_trips_through_raw_json() {
        let (dir, app) = harness().await;
        std::fs::write(dir.path().join("a.txt"), "hi\n").unwrap();
        let router = IntentRouter::new(app);
        let envelope = router.dispatch("read_code", serde_json::json!({ "file": "a.txt" }), 0).await;
        assert!(envelope.ok);
        assert_eq!(envelope.data.unwrap()["content"], "hi\n");
    }

    #[tokio::test]
    async fn malformed_args_surface_as_missing_parameter() {
        let (_dir, app) = harness().await;
        let router = IntentRouter::new(app);
        let envelope = router.dispatch("read_code", serde_json::json!({ "view": "nonsense" }), 0).await;
        assert!(!envelope.ok);
        assert_eq!(envelope.error.unwrap().code, "MissingParameter");
    }
}
