//! Candidate collection (§4.7 steps 2–3): scope-filtered file list, then
//! chunk loading with a budget-aware prune.

use std::collections::HashSet;

use smartctx_error::Degradation;
use smartctx_error::DegradationReason;
use smartctx_indexer::Indexer;
use smartctx_store::Chunk;
use smartctx_store::Store;

use crate::tokenize::tokenize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Docs,
    Project,
    All,
}

impl SearchScope {
    /// Scope globs per §4.7: `docs` restricts to documentation-ish trees,
    /// `project`/`all` widen outward. `all` additionally allows comment and
    /// log/metrics-style paths that `project` would otherwise keep but not
    /// specially boost (that boost lives in the base-ordering stage).
    pub fn globs(self) -> Vec<String> {
        match self {
            SearchScope::Docs => vec!["docs/**".to_string(), "**/*.md".to_string(), "**/*.mdx".to_string()],
            SearchScope::Project | SearchScope::All => Vec::new(),
        }
    }
}

/// Candidate file collection: lexical scout over the scope's globs,
/// deduplicated and capped, falling back to a filename substring search
/// when the text-overlap scout finds nothing (§4.7 step 2).
pub async fn collect_candidate_files(
    store: &Store,
    query: &str,
    scope: SearchScope,
    max_candidates: usize,
) -> Vec<String> {
    let globs = scope.globs();
    let pool = store.list_files_matching(globs).await.unwrap_or_default();
    let query_tokens: HashSet<String> = tokenize(query).into_iter().collect();

    let mut scored: Vec<(String, u32)> = Vec::new();
    for path in &pool {
        let chunks = store.get_chunks_for_path(path).await.unwrap_or_default();
        let hits: u32 = chunks
            .iter()
            .map(|c| {
                tokenize(&c.text)
                    .into_iter()
                    .filter(|t| query_tokens.contains(t))
                    .count() as u32
            })
            .sum();
        if hits > 0 {
            scored.push((path.clone(), hits));
        }
    }

    if scored.is_empty() {
        // Fallback: filename substring search (§4.7 step 2).
        scored = pool
            .iter()
            .filter(|p| query_tokens.iter().any(|t| p.to_lowercase().contains(t.as_str())))
            .map(|p| (p.clone(), 1))
            .collect();
    }

    scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.into_iter().take(max_candidates).map(|(p, _)| p).collect()
}

pub struct CandidateChunks {
    pub chunks: Vec<Chunk>,
    pub degradations: Vec<Degradation>,
}

/// Loads chunks for each candidate file (reindexing first if stale), then
/// prunes to `max_chunk_candidates` by a quick token-overlap score if the
/// total exceeds budget (§4.7 step 3).
pub async fn collect_candidate_chunks(
    store: &Store,
    indexer: &Indexer,
    query: &str,
    files: &[String],
    max_chunk_candidates: usize,
) -> CandidateChunks {
    let mut chunks = Vec::new();
    for path in files {
        if let Err(e) = indexer.ensure_fresh(path).await {
            tracing::warn!(path, error = %e, "search: failed to refresh candidate file, using last-known chunks");
        }
        chunks.extend(store.get_chunks_for_path(path).await.unwrap_or_default());
    }

    let mut degradations = Vec::new();
    if chunks.len() > max_chunk_candidates {
        let query_tokens: HashSet<String> = tokenize(query).into_iter().collect();
        let mut scored: Vec<(Chunk, u32)> = chunks
            .into_iter()
            .map(|c| {
                let hits = tokenize(&c.text).into_iter().filter(|t| query_tokens.contains(t)).count() as u32;
                (c, hits)
            })
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.id.cmp(&b.0.id)));
        scored.truncate(max_chunk_candidates);
        chunks = scored.into_iter().map(|(c, _)| c).collect();
        degradations.push(Degradation::new(DegradationReason::BudgetExceeded));
    }

    CandidateChunks { chunks, degradations }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartctx_graph::DependencyGraph;
    use std::sync::Arc;

    #[tokio::test]
    async fn falls_back_to_filename_search_when_no_text_hits() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("widgets.md"), "unrelated body text\n").unwrap();
        let store = Arc::new(Store::open_in_memory().unwrap());
        let graph = Arc::new(DependencyGraph::new(store.clone()));
        let indexer = Indexer::new(store.clone(), graph, dir.path().to_path_buf());
        indexer.ensure_fresh("widgets.md").await.unwrap();

        let files = collect_candidate_files(&store, "widgets", SearchScope::All, 10).await;
        assert_eq!(files, vec!["widgets.md".to_string()]);
    }
}
