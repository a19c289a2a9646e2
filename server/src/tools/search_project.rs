//! `search_project` (§4.11): dispatches to the hybrid search pipeline (C7)
//! or to a symbol/filename/directory lookup in the Store, with `auto` mode
//! silently escalating through symbol → file → directory → content until
//! one yields a hit (§9 open question, resolved).

use serde::Deserialize;
use serde::Serialize;
use smartctx_error::Degradation;
use smartctx_error::Error;
use smartctx_error::ErrorCode;
use smartctx_error::Result;
use smartctx_search::SearchRequest;
use smartctx_search::SearchScope;
use smartctx_store::LineRange;

use crate::app::App;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Auto,
    Symbol,
    File,
    Directory,
}

#[derive(Debug, Deserialize)]
pub struct SearchProjectArgs {
    pub query: String,
    #[serde(default = "default_type")]
    #[serde(rename = "type")]
    pub search_type: SearchType,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_type() -> SearchType {
    SearchType::Auto
}

fn default_max_results() -> usize {
    10
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultItem {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<LineRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct SearchProjectData {
    pub resolved_as: &'static str,
    pub results: Vec<ResultItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pack_id: Option<String>,
    pub degraded: bool,
    pub degradations: Vec<Degradation>,
}

/// Heuristic classification for `auto` (§4.11): trailing slash means
/// directory, a path separator or a file-ish extension means file,
/// otherwise a bare identifier-looking token means symbol.
fn classify(query: &str) -> SearchType {
    let trimmed = query.trim();
    if trimmed.ends_with('/') {
        SearchType::Directory
    } else if trimmed.contains('/') || trimmed.contains('\\') {
        SearchType::File
    } else if looks_like_bare_identifier(trimmed) {
        SearchType::Symbol
    } else {
        SearchType::File
    }
}

fn looks_like_bare_identifier(s: &str) -> bool {
    !s.is_empty()
        && !s.contains(char::is_whitespace)
        && s.chars().all(|c| c.is_alphanumeric() || c == '_')
        && s.chars().next().map(|c| c.is_alphabetic() || c == '_').unwrap_or(false)
}

async fn search_symbols(app: &App, query: &str, max_results: usize) -> Result<Vec<ResultItem>> {
    let mut symbols = app.store.find_symbol(query).await?;
    if symbols.is_empty() {
        symbols = app.store.symbols_like(query, max_results).await?;
    }
    symbols.truncate(max_results);
    Ok(symbols
        .into_iter()
        .map(|s| ResultItem {
            path: s.file_path,
            symbol: Some(s.name),
            range: Some(s.range),
            preview: s.signature,
            scores: None,
        })
        .collect())
}

async fn search_files(app: &App, query: &str, max_results: usize) -> Result<Vec<ResultItem>> {
    let needle = query.to_lowercase();
    let mut files = app.store.list_files_matching(Vec::new()).await?;
    files.retain(|p| p.to_lowercase().contains(&needle));
    files.sort();
    files.truncate(max_results);
    Ok(files
        .into_iter()
        .map(|path| ResultItem {
            path,
            symbol: None,
            range: None,
            preview: None,
            scores: None,
        })
        .collect())
}

async fn search_directory(app: &App, query: &str, max_results: usize) -> Result<Vec<ResultItem>> {
    let prefix = query.trim_end_matches('/');
    let mut files = app.store.list_files_matching(Vec::new()).await?;
    files.retain(|p| prefix.is_empty() || p.starts_with(prefix));
    files.sort();
    files.truncate(max_results);
    Ok(files
        .into_iter()
        .map(|path| ResultItem {
            path,
            symbol: None,
            range: None,
            preview: None,
            scores: None,
        })
        .collect())
}

async fn search_content(app: &App, query: &str, max_results: usize, now_ms: i64) -> Result<SearchProjectData> {
    let outcome = app
        .search
        .search(
            SearchRequest {
                query: query.to_string(),
                scope: SearchScope::All,
                max_results,
                vector_enabled: true,
                deadline: None,
            },
            now_ms,
        )
        .await?;
    let mut results: Vec<ResultItem> = outcome
        .items
        .into_iter()
        .map(|item| ResultItem {
            path: item.path,
            symbol: None,
            range: Some(item.range),
            preview: Some(item.preview),
            scores: serde_json::to_value(item.scores).ok(),
        })
        .collect();
    results.truncate(max_results);
    Ok(SearchProjectData {
        resolved_as: "content",
        results,
        pack_id: Some(outcome.pack_id),
        degraded: outcome.degraded,
        degradations: outcome.degradations,
    })
}

pub async fn search_project(app: &App, args: SearchProjectArgs, now_ms: i64) -> Result<SearchProjectData> {
    if args.query.trim().is_empty() {
        return Err(Error::coded(ErrorCode::MissingParameter, "search_project requires `query`"));
    }

    match args.search_type {
        SearchType::Symbol => {
            let results = search_symbols(app, &args.query, args.max_results).await?;
            Ok(bare(results, "symbol"))
        }
        SearchType::File => {
            let results = search_files(app, &args.query, args.max_results).await?;
            Ok(bare(results, "file"))
        }
        SearchType::Directory => {
            let results = search_directory(app, &args.query, args.max_results).await?;
            Ok(bare(results, "directory"))
        }
        SearchType::Auto => {
            let primary = classify(&args.query);
            let order: Vec<(&'static str, SearchType)> = [
                ("symbol", SearchType::Symbol),
                ("file", SearchType::File),
                ("directory", SearchType::Directory),
            ]
            .into_iter()
            .filter(|(_, t)| *t == primary)
            .chain(
                [
                    ("symbol", SearchType::Symbol),
                    ("file", SearchType::File),
                    ("directory", SearchType::Directory),
                ]
                .into_iter()
                .filter(|(_, t)| *t != primary),
            )
            .collect();

            for (label, kind) in order {
                let results = match kind {
                    SearchType::Symbol => search_symbols(app, &args.query, args.max_results).await?,
                    SearchType::File => search_files(app, &args.query, args.max_results).await?,
                    SearchType::Directory => search_directory(app, &args.query, args.max_results).await?,
                    SearchType::Auto => unreachable!(),
                };
                if !results.is_empty() {
                    return Ok(bare_named(results, label));
                }
            }

            search_content(app, &args.query, args.max_results, now_ms).await
        }
    }
}

fn bare(results: Vec<ResultItem>, resolved_as: &'static str) -> SearchProjectData {
    SearchProjectData {
        resolved_as,
        results,
        pack_id: None,
        degraded: false,
        degradations: Vec::new(),
    }
}

fn bare_named(results: Vec<ResultItem>, resolved_as: &'static str) -> SearchProjectData {
    bare(results, resolved_as)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn harness() -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let app = App::bootstrap(dir.path().to_path_buf()).await.unwrap();
        (dir, app)
    }

    #[test]
    fn classify_heuristics() {
        assert_eq!(classify("src/"), SearchType::Directory);
        assert_eq!(classify("src/lib.rs"), SearchType::File);
        assert_eq!(classify("doFoo"), SearchType::Symbol);
    }

    #[tokio::test]
    async fn auto_falls_back_from_symbol_to_file() {
        let (dir, app) = harness().await;
        std::fs::write(dir.path().join("myIdentifier.txt"), "body\n").unwrap();
        app.indexer.ensure_fresh("myIdentifier.txt").await.unwrap();

        let data = search_project(
            &app,
            SearchProjectArgs { query: "myIdentifier".into(), search_type: SearchType::Auto, max_results: 10 },
            1_000,
        )
        .await
        .unwrap();
        assert_eq!(data.resolved_as, "file");
        assert_eq!(data.results.len(), 1);
    }

    #[tokio::test]
    async fn missing_query_is_missing_parameter() {
        let (_dir, app) = harness().await;
        let err = search_project(&app, SearchProjectArgs { query: "".into(), search_type: SearchType::Auto, max_results: 10 }, 1_000)
            .await
            .unwrap_err();
        assert_eq!(err.code(), smartctx_error::ErrorCode::MissingParameter);
    }
}
