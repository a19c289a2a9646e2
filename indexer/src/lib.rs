//! Indexer (C3, §4.3): keeps the [`Store`] in sync with the filesystem and
//! invalidates downstream caches (evidence packs lazily, via staleness
//! tokens; graph closures eagerly, via [`DependencyGraph::invalidate`]).
//!
//! Per-file failures are logged and skipped (§4.3 failure policy) — the
//! indexer never fails the surrounding `read_code`/`search_project`/
//! `edit_code` request it is refreshing state for.

mod imports;

pub use imports::RawImport;
pub use imports::extract_imports;
pub use imports::resolve_import_target;

use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use smartctx_chunker::ChunkingOptions;
use smartctx_chunker::chunk_file;
use smartctx_chunker::detect_language;
use smartctx_chunker::sha256_hex;
use smartctx_error::Result;
use smartctx_graph::DependencyGraph;
use smartctx_store::FileEdge;
use smartctx_store::FileRecord;
use smartctx_store::IndentStyle;
use smartctx_store::NewlineStyle;
use smartctx_store::Store;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IndexStats {
    pub files_scanned: u64,
    pub files_reindexed: u64,
    pub files_removed: u64,
    pub failures: Vec<(String, String)>,
}

pub struct Indexer {
    store: Arc<Store>,
    graph: Arc<DependencyGraph>,
    project_root: PathBuf,
    opts: ChunkingOptions,
}

impl Indexer {
    pub fn new(store: Arc<Store>, graph: Arc<DependencyGraph>, project_root: PathBuf) -> Self {
        Self {
            store,
            graph,
            project_root,
            opts: ChunkingOptions::default(),
        }
    }

    pub fn with_chunking_options(mut self, opts: ChunkingOptions) -> Self {
        self.opts = opts;
        self
    }

    fn abs_path(&self, rel_path: &str) -> PathBuf {
        self.project_root.join(rel_path)
    }

    /// Ensure one file's Store state matches on-disk content. Returns
    /// `true` if the file was (re)indexed, `false` if it was already
    /// fresh or has been removed from disk.
    pub async fn ensure_fresh(&self, rel_path: &str) -> Result<bool> {
        let abs = self.abs_path(rel_path);
        let bytes = match tokio::fs::read(&abs).await {
            Ok(b) => b,
            Err(_) => {
                self.remove_file(rel_path).await?;
                return Ok(false);
            }
        };
        let hash = sha256_hex(&bytes);
        if let Some(existing) = self.store.get_file(rel_path).await? {
            if existing.content_hash == hash {
                return Ok(false);
            }
        }
        self.reindex_file(rel_path, &bytes, hash).await?;
        Ok(true)
    }

    async fn remove_file(&self, rel_path: &str) -> Result<()> {
        if self.store.get_file(rel_path).await?.is_none() {
            return Ok(());
        }
        self.store.remove_file(rel_path).await?;
        self.store.remove_file_edges_touching(rel_path).await?;
        self.store
            .replace_symbol_edges(rel_path.to_string(), Vec::new())
            .await?;
        self.graph.invalidate();
        Ok(())
    }

    async fn reindex_file(&self, rel_path: &str, bytes: &[u8], hash: String) -> Result<()> {
        let text = match std::str::from_utf8(bytes) {
            Ok(t) => t,
            Err(_) => {
                tracing::warn!(path = rel_path, "skipping non-UTF-8 file");
                return Ok(());
            }
        };
        let language = detect_language(rel_path);
        let (chunks, symbols) = chunk_file(rel_path, text, language.as_deref(), self.opts);

        let metadata = tokio::fs::metadata(self.abs_path(rel_path)).await.ok();
        let mtime = metadata
            .as_ref()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let record = FileRecord {
            path: rel_path.to_string(),
            content_hash: hash,
            size_bytes: bytes.len() as u64,
            line_count: text.lines().count() as u32,
            mtime,
            language_tag: language.clone(),
            newline_style: detect_newline_style(bytes),
            indent_style: detect_indent_style(text),
        };

        self.store.upsert_file(record).await?;
        self.store.replace_chunks(rel_path.to_string(), chunks).await?;
        self.store.replace_symbols(rel_path.to_string(), symbols).await?;

        if let Some(lang) = language {
            let raw_imports = extract_imports(&lang, text);
            if !raw_imports.is_empty() {
                let known: HashSet<String> = self
                    .store
                    .list_files_matching(Vec::new())
                    .await?
                    .into_iter()
                    .collect();
                let edges: Vec<FileEdge> = raw_imports
                    .into_iter()
                    .filter_map(|imp| {
                        resolve_import_target(rel_path, &imp.target, &known).map(|to_path| FileEdge {
                            from_path: rel_path.to_string(),
                            to_path,
                            edge_kind: imp.kind,
                        })
                    })
                    .collect();
                self.store.replace_file_edges(rel_path.to_string(), edges).await?;
            } else {
                self.store.replace_file_edges(rel_path.to_string(), Vec::new()).await?;
            }
        }

        self.graph.invalidate();
        Ok(())
    }

    /// Walk the project tree and ensure every file's Store state is fresh,
    /// pruning Store entries for files no longer on disk. File discovery
    /// itself (ignore-file semantics) is the out-of-scope collaborator
    /// boundary named in §1; this uses the `ignore` crate's default
    /// walker, which is the closest available stand-in.
    pub async fn reindex_project(&self) -> Result<IndexStats> {
        let mut stats = IndexStats::default();
        let root = self.project_root.clone();
        let state_dir = smartctx_config::Config::state_dir(&root);

        let entries = {
            let root = root.clone();
            tokio::task::spawn_blocking(move || {
                let mut out = Vec::new();
                for entry in ignore::WalkBuilder::new(&root).hidden(false).build().flatten() {
                    if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                        out.push(entry.path().to_path_buf());
                    }
                }
                out
            })
            .await
            .unwrap_or_default()
        };

        let mut seen: HashSet<String> = HashSet::new();
        for abs in entries {
            if abs.starts_with(&state_dir) {
                continue;
            }
            let rel = match abs.strip_prefix(&root) {
                Ok(r) => r.to_string_lossy().replace('\\', "/"),
                Err(_) => continue,
            };
            stats.files_scanned += 1;
            seen.insert(rel.clone());
            match self.ensure_fresh(&rel).await {
                Ok(true) => stats.files_reindexed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(path = rel, error = %e, "indexer: per-file failure, skipping");
                    stats.failures.push((rel, e.to_string()));
                }
            }
        }

        for existing in self.store.all_files().await? {
            if !seen.contains(&existing.path) {
                self.remove_file(&existing.path).await?;
                stats.files_removed += 1;
            }
        }

        Ok(stats)
    }
}

fn detect_newline_style(bytes: &[u8]) -> NewlineStyle {
    if bytes.windows(2).any(|w| w == b"\r\n") {
        NewlineStyle::CrLf
    } else {
        NewlineStyle::Lf
    }
}

fn detect_indent_style(text: &str) -> IndentStyle {
    let mut spaces2 = 0u32;
    let mut spaces4 = 0u32;
    let mut tabs = 0u32;
    for line in text.lines().take(200) {
        if line.starts_with('\t') {
            tabs += 1;
        } else if let Some(stripped) = line.strip_prefix("  ") {
            if stripped.starts_with("  ") {
                spaces4 += 1;
            } else {
                spaces2 += 1;
            }
        }
    }
    if tabs > spaces2 && tabs > spaces4 {
        IndentStyle::Tabs
    } else if spaces4 >= spaces2 && spaces4 > 0 {
        IndentStyle::Spaces4
    } else if spaces2 > 0 {
        IndentStyle::Spaces2
    } else {
        IndentStyle::Unknown
    }
}

/// Resolve a caller-supplied path against the project root, rejecting any
/// path that escapes it (symlink-aware) — the `SecurityViolation` gate
/// shared by every tool that touches the filesystem (§7).
pub fn resolve_project_path(project_root: &Path, candidate: &str) -> Option<PathBuf> {
    let joined = project_root.join(candidate.trim_start_matches('/'));
    let canonical_root = std::fs::canonicalize(project_root).ok()?;
    let canonical = dunce_canonicalize(&joined)?;
    if canonical.starts_with(&canonical_root) {
        Some(canonical)
    } else {
        None
    }
}

/// Canonicalizes a path that may not exist yet by canonicalizing its
/// deepest existing ancestor and re-joining the remainder.
fn dunce_canonicalize(path: &Path) -> Option<PathBuf> {
    if let Ok(c) = std::fs::canonicalize(path) {
        return Some(c);
    }
    let mut ancestor = path.to_path_buf();
    let mut remainder = Vec::new();
    loop {
        if ancestor.as_os_str().is_empty() {
            return None;
        }
        if let Ok(c) = std::fs::canonicalize(&ancestor) {
            let mut out = c;
            for part in remainder.into_iter().rev() {
                out.push(part);
            }
            return Some(out);
        }
        let name = ancestor.file_name()?.to_os_string();
        remainder.push(name);
        if !ancestor.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_fresh_indexes_new_file_then_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "# Title\nbody\n").unwrap();
        let store = Arc::new(Store::open_in_memory().unwrap());
        let graph = Arc::new(DependencyGraph::new(store.clone()));
        let indexer = Indexer::new(store.clone(), graph, dir.path().to_path_buf());

        assert!(indexer.ensure_fresh("a.md").await.unwrap());
        assert!(!indexer.ensure_fresh("a.md").await.unwrap());
        let chunks = store.get_chunks_for_path("a.md").await.unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn ensure_fresh_removes_deleted_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        std::fs::write(&path, "x\n").unwrap();
        let store = Arc::new(Store::open_in_memory().unwrap());
        let graph = Arc::new(DependencyGraph::new(store.clone()));
        let indexer = Indexer::new(store.clone(), graph, dir.path().to_path_buf());
        indexer.ensure_fresh("gone.txt").await.unwrap();
        std::fs::remove_file(&path).unwrap();
        indexer.ensure_fresh("gone.txt").await.unwrap();
        assert!(store.get_file("gone.txt").await.unwrap().is_none());
    }

    #[test]
    fn resolve_project_path_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        assert!(resolve_project_path(dir.path(), "sub/../../etc/passwd").is_none());
        assert!(resolve_project_path(dir.path(), "sub").is_some());
    }
}
