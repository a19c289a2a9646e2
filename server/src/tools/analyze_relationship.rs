//! `analyze_relationship` (§4.11): dispatches to the dependency graph (C4)
//! and the impact analyzer (C10) depending on `mode`.

use serde::Deserialize;
use serde::Serialize;
use smartctx_error::Error;
use smartctx_error::ErrorCode;
use smartctx_error::Result;
use smartctx_graph::GraphEdge;
use smartctx_store::Direction as StoreDirection;

use crate::app::App;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationMode {
    Impact,
    Dependencies,
    Calls,
    DataFlow,
    Types,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationDirection {
    Upstream,
    Downstream,
}

impl From<RelationDirection> for StoreDirection {
    fn from(d: RelationDirection) -> Self {
        match d {
            RelationDirection::Upstream => StoreDirection::Upstream,
            RelationDirection::Downstream => StoreDirection::Downstream,
        }
    }
}

fn default_direction() -> RelationDirection {
    RelationDirection::Downstream
}

fn default_max_depth() -> u32 {
    4
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRelationshipArgs {
    pub target: String,
    pub mode: RelationMode,
    #[serde(default = "default_direction")]
    pub direction: RelationDirection,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    /// For `data_flow` only: file to scan and the line to start from.
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RelationshipData {
    pub resolved_target: String,
    pub nodes: Vec<String>,
    pub edges: Vec<GraphEdge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<smartctx_impact::ImpactReport>,
}

pub async fn analyze_relationship(app: &App, args: AnalyzeRelationshipArgs) -> Result<RelationshipData> {
    if args.target.trim().is_empty() {
        return Err(Error::coded(ErrorCode::MissingParameter, "analyze_relationship requires `target`"));
    }

    match args.mode {
        RelationMode::Dependencies => {
            let direction: StoreDirection = args.direction.into();
            let nodes = app.graph.transitive(&args.target, direction, args.max_depth).await?;
            let edges = app
                .graph
                .direct(&args.target, direction)
                .await?
                .into_iter()
                .map(|e| GraphEdge {
                    from: e.from_path,
                    to: e.to_path,
                    label: e.edge_kind.as_str().to_string(),
                })
                .collect();
            Ok(RelationshipData {
                resolved_target: args.target,
                nodes: nodes.into_iter().collect(),
                edges,
                impact: None,
            })
        }
        RelationMode::Calls => {
            let direction: StoreDirection = args.direction.into();
            let (nodes, edges) = app.graph.symbol_call_graph(&args.target, direction, args.max_depth).await?;
            let resolved_target = resolve_symbol_target(app, &args.target).await?;
            Ok(RelationshipData {
                resolved_target,
                nodes: nodes.into_iter().collect(),
                edges,
                impact: None,
            })
        }
        RelationMode::Types => {
            let direction: StoreDirection = args.direction.into();
            let (nodes, edges) = app.graph.type_graph(&args.target, direction, args.max_depth).await?;
            let resolved_target = resolve_symbol_target(app, &args.target).await?;
            Ok(RelationshipData {
                resolved_target,
                nodes: nodes.into_iter().collect(),
                edges,
                impact: None,
            })
        }
        RelationMode::DataFlow => {
            let file = args
                .file
                .as_ref()
                .ok_or_else(|| Error::coded(ErrorCode::MissingParameter, "data_flow mode requires `file`"))?;
            let line = args
                .line
                .ok_or_else(|| Error::coded(ErrorCode::MissingParameter, "data_flow mode requires `line`"))?;
            let abs = smartctx_indexer::resolve_project_path(&app.project_root, file)
                .ok_or_else(|| Error::coded(ErrorCode::SecurityViolation, format!("{file} escapes project root")))?;
            let text = tokio::fs::read_to_string(&abs)
                .await
                .map_err(|_| Error::coded(ErrorCode::FileNotFound, format!("{file} not found")))?;
            let hits = app.graph.data_flow(&text, &args.target, line, args.max_depth.max(1));
            let nodes: Vec<String> = hits.iter().map(|l| format!("{file}:{l}")).collect();
            Ok(RelationshipData {
                resolved_target: args.target,
                nodes,
                edges: Vec::new(),
                impact: None,
            })
        }
        RelationMode::Impact => {
            let report = app.impact.analyze(&[args.target.clone()], 0).await?;
            let mut nodes = report.incoming.clone();
            nodes.extend(report.outgoing.clone());
            let edges = report
                .incoming
                .iter()
                .map(|from| GraphEdge {
                    from: from.clone(),
                    to: args.target.clone(),
                    label: "upstream".to_string(),
                })
                .chain(report.outgoing.iter().map(|to| GraphEdge {
                    from: args.target.clone(),
                    to: to.clone(),
                    label: "downstream".to_string(),
                }))
                .collect();
            Ok(RelationshipData {
                resolved_target: args.target,
                nodes,
                edges,
                impact: Some(report),
            })
        }
    }
}

/// `calls`/`types` modes take a symbol name; if it doesn't resolve to a
/// known symbol we still run the traversal (empty result) but surface a
/// suggestion via the resolved_target field falling back to the raw input.
async fn resolve_symbol_target(app: &App, target: &str) -> Result<String> {
    let matches = app.store.find_symbol(target).await?;
    if matches.is_empty() {
        let fuzzy = app.store.symbols_like(target, 1).await?;
        if fuzzy.is_empty() {
            return Err(Error::coded(ErrorCode::SymbolNotFound, format!("no symbol named `{target}`")));
        }
    }
    Ok(target.to_string())
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
    async fn missing_target_is_missing_parameter() {
        let (_dir, app) = harness().await;
        let err = analyze_relationship(
            &app,
            AnalyzeRelationshipArgs {
                target: "".into(),
                mode: RelationMode::Dependencies,
                direction: RelationDirection::Downstream,
                max_depth: 4,
                file: None,
                line: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), smartctx_error::ErrorCode::MissingParameter);
    }

    #[tokio::test]
    async fn dependencies_mode_returns_direct_edges() {
        let (_dir, app) = harness().await;
        app.store
            .replace_file_edges(
                "a.rs".to_string(),
                vec![smartctx_store::FileEdge {
                    from_path: "a.rs".to_string(),
                    to_path: "b.rs".to_string(),
                    edge_kind: smartctx_store::FileEdgeKind::Import,
                }],
            )
            .await
            .unwrap();

        let data = analyze_relationship(
            &app,
            AnalyzeRelationshipArgs {
                target: "a.rs".into(),
                mode: RelationMode::Dependencies,
                direction: RelationDirection::Downstream,
                max_depth: 4,
                file: None,
                line: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(data.nodes, vec!["b.rs".to_string()]);
        assert_eq!(data.edges.len(), 1);
    }

    #[tokio::test]
    async fn impact_mode_reports_risk() {
        let (_dir, app) = harness().await;
        let data = analyze_relationship(
            &app,
            AnalyzeRelationshipArgs {
                target: "lonely.rs".into(),
                mode: RelationMode::Impact,
                direction: RelationDirection::Downstream,
                max_depth: 4,
                file: None,
                line: None,
            },
        )
        .await
        .unwrap();
        assert!(data.impact.is_some());
    }
}
