//! Wires up every component (§2 dependency order) into one long-lived
//! handle the intent router dispatches against, and runs WAL recovery
//! once at startup before any command is accepted (§3, §4.9).

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use smartctx_config::Config;
use smartctx_error::Result;
use smartctx_graph::DependencyGraph;
use smartctx_impact::ImpactAnalyzer;
use smartctx_indexer::Indexer;
use smartctx_search::DisabledProvider;
use smartctx_search::EmbeddingProvider;
use smartctx_search::PipelineParams;
use smartctx_search::SearchPipeline;
use smartctx_store::Store;
use smartctx_txn::TransactionCoordinator;

pub struct App {
    pub project_root: PathBuf,
    pub config: Config,
    pub store: Arc<Store>,
    pub graph: Arc<DependencyGraph>,
    pub indexer: Arc<Indexer>,
    pub search: Arc<SearchPipeline>,
    pub txn: Arc<TransactionCoordinator>,
    pub impact: Arc<ImpactAnalyzer>,
}

impl App {
    /// Opens (creating if needed) `<project_root>/.smart-context/index.db`,
    /// loads layered config, wires every component, and recovers any WAL
    /// entry still `pending` from a prior crash (§3 invariant).
    pub async fn bootstrap(project_root: PathBuf) -> Result<Self> {
        Self::bootstrap_with_provider(project_root, Arc::new(DisabledProvider)).await
    }

    pub async fn bootstrap_with_provider(project_root: PathBuf, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let config = Config::load(&project_root);
        let state_dir = Config::state_dir(&project_root);
        tokio::fs::create_dir_all(&state_dir).await?;

        let db_path = Config::db_path(&project_root);
        let store = Arc::new(Store::open(&db_path)?);

        let graph = Arc::new(DependencyGraph::new(store.clone()));
        let indexer = Arc::new(Indexer::new(store.clone(), graph.clone(), project_root.clone()));

        let root_fingerprint = root_fingerprint(&project_root);
        let params: PipelineParams = (&config.search).into();
        let search = Arc::new(SearchPipeline::new(
            store.clone(),
            indexer.clone(),
            provider,
            params,
            config.server.evidence_pack_cache_size,
            config.search.max_provider_concurrency,
            root_fingerprint,
        ));

        let txn = Arc::new(TransactionCoordinator::new(store.clone(), indexer.clone(), project_root.clone()));
        let impact = Arc::new(ImpactAnalyzer::new(graph.clone(), config.impact.clone()));

        let app = Self {
            project_root,
            config,
            store,
            graph,
            indexer,
            search,
            txn,
            impact,
        };

        let recovered = app.txn.recover().await?;
        if !recovered.is_empty() {
            tracing::warn!(count = recovered.len(), transactions = ?recovered, "recovered pending transactions from WAL at startup");
        }

        Ok(app)
    }
}

/// Stable hash of the project root's absolute path (§3 "Project root").
pub fn root_fingerprint(project_root: &Path) -> String {
    let canonical = std::fs::canonicalize(project_root).unwrap_or_else(|_| project_root.to_path_buf());
    smartctx_chunker::sha256_hex(canonical.to_string_lossy().as_bytes())
}
