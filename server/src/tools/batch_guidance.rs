//! `get_batch_guidance` (§4.11, §10.5): groups the requested files into
//! connected components over the file-dependency graph, then scans each
//! cluster's source for import/trait tokens present in a majority of its
//! files but missing from a minority member.

use std::collections::HashMap;
use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use smartctx_error::Error;
use smartctx_error::ErrorCode;
use smartctx_error::Result;
use smartctx_indexer::resolve_project_path;

use crate::app::App;

#[derive(Debug, Deserialize)]
pub struct BatchGuidanceArgs {
    pub file_paths: Vec<String>,
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MissingPatternWarning {
    pub token: String,
    pub present_in: Vec<String>,
    pub missing_from: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Cluster {
    pub files: Vec<String>,
    pub warnings: Vec<MissingPatternWarning>,
}

#[derive(Debug, Serialize)]
pub struct BatchGuidanceData {
    pub clusters: Vec<Cluster>,
}

static IMPORT_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:use|import|from)\s+([\w:./-]+)").unwrap());
static TRAIT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:trait|interface)\s+(\w+)|impl\s+(\w+)\s+for\b").unwrap());

fn extract_tokens(text: &str) -> HashSet<String> {
    let mut tokens = HashSet::new();
    for line in text.lines() {
        if let Some(caps) = IMPORT_LINE.captures(line) {
            tokens.insert(format!("import:{}", &caps[1]));
        }
        if let Some(caps) = TRAIT_LINE.captures(line) {
            if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
                tokens.insert(format!("trait:{}", m.as_str()));
            }
        }
    }
    tokens
}

pub async fn get_batch_guidance(app: &App, args: BatchGuidanceArgs) -> Result<BatchGuidanceData> {
    if args.file_paths.is_empty() {
        return Err(Error::coded(ErrorCode::MissingParameter, "get_batch_guidance requires `file_paths`"));
    }

    let all_edges = app.store.all_file_edges().await?;
    let components = smartctx_graph::connected_components(&args.file_paths, &all_edges);

    let custom_pattern = args.pattern.as_deref().map(Regex::new).transpose().ok().flatten();

    let mut clusters = Vec::with_capacity(components.len());
    for files in components {
        let mut per_file_tokens: HashMap<String, HashSet<String>> = HashMap::new();
        for path in &files {
            let text = read_text_best_effort(app, path).await;
            let mut tokens = extract_tokens(&text);
            if let Some(re) = &custom_pattern {
                if re.is_match(&text) {
                    tokens.insert(format!("pattern:{}", args.pattern.as_deref().unwrap_or_default()));
                }
            }
            per_file_tokens.insert(path.clone(), tokens);
        }

        let mut token_presence: HashMap<&str, Vec<&String>> = HashMap::new();
        for (path, tokens) in &per_file_tokens {
            for token in tokens {
                token_presence.entry(token.as_str()).or_default().push(path);
            }
        }

        let total = files.len();
        let mut warnings = Vec::new();
        for (token, present_paths) in token_presence {
            let present_count = present_paths.len();
            if present_count * 2 > total && present_count < total {
                let present_in: Vec<String> = present_paths.iter().map(|s| s.to_string()).collect();
                let missing_from: Vec<String> = files.iter().filter(|f| !present_paths.contains(f)).cloned().collect();
                warnings.push(MissingPatternWarning {
                    token: token.to_string(),
                    present_in,
                    missing_from,
                });
            }
        }
        warnings.sort_by(|a, b| a.token.cmp(&b.token));

        clusters.push(Cluster { files, warnings });
    }

    Ok(BatchGuidanceData { clusters })
}

async fn read_text_best_effort(app: &App, rel_path: &str) -> String {
    match resolve_project_path(&app.project_root, rel_path) {
        Some(abs) => tokio::fs::read_to_string(&abs).await.unwrap_or_default(),
        None => String::new(),
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
    async fn empty_file_paths_is_missing_parameter() {
        let (_dir, app) = harness().await;
        let err = get_batch_guidance(&app, BatchGuidanceArgs { file_paths: Vec::new(), pattern: None }).await.unwrap_err();
        assert_eq!(err.code(), smartctx_error::ErrorCode::MissingParameter);
    }

    #[tokio::test]
    async fn flags_import_missing_from_a_minority_file() {
        let (dir, app) = harness().await;
        std::fs::write(dir.path().join("a.rs"), "use serde::Serialize;\nfn a() {}\n").unwrap();
        std::fs::write(dir.path().join("b.rs"), "use serde::Serialize;\nfn b() {}\n").unwrap();
        std::fs::write(dir.path().join("c.rs"), "fn c() {}\n").unwrap();

        app.store
            .replace_file_edges("a.rs".to_string(), vec![smartctx_store::FileEdge {
                from_path: "a.rs".to_string(),
                to_path: "b.rs".to_string(),
                edge_kind: smartctx_store::FileEdgeKind::Import,
            }])
            .await
            .unwrap();
        app.store
            .replace_file_edges("b.rs".to_string(), vec![smartctx_store::FileEdge {
                from_path: "b.rs".to_string(),
                to_path: "c.rs".to_string(),
                edge_kind: smartctx_store::FileEdgeKind::Import,
            }])
            .await
            .unwrap();

        let data = get_batch_guidance(
            &app,
            BatchGuidanceArgs { file_paths: vec!["a.rs".into(), "b.rs".into(), "c.rs".into()], pattern: None },
        )
        .await
        .unwrap();

        assert_eq!(data.clusters.len(), 1);
        let cluster = &data.clusters[0];
        assert!(cluster.warnings.iter().any(|w| w.token == "import:serde::Serialize" && w.missing_from == vec!["c.rs".to_string()]));
    }
}
