//! Search Pipeline (C7, §4.7): candidate collection → BM25 + vector fusion
//! (RRF) → MMR diversification → evidence shaping → pack cache.

use std::collections::HashSet;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use smartctx_chunker::build_preview;
use smartctx_error::Degradation;
use smartctx_error::Result;
use smartctx_indexer::Indexer;
use smartctx_store::Chunk;
use smartctx_store::EvidencePack;
use smartctx_store::LineRange;
use smartctx_store::PackItem;
use smartctx_store::PackRole;
use smartctx_store::Store;

use crate::bm25::Bm25Params;
use crate::bm25::bm25f_rank;
use crate::candidates::SearchScope;
use crate::candidates::collect_candidate_chunks;
use crate::candidates::collect_candidate_files;
use crate::fusion::RrfParams;
use crate::fusion::reciprocal_rank_fusion;
use crate::mmr::MmrCandidate;
use crate::mmr::diversify;
use crate::pack_cache::PackCache;
use crate::tokenize::tokenize;
use crate::vector::EmbeddingProvider;
use crate::vector::ProviderGate;
use crate::vector::VectorLimits;
use crate::vector::rank_vectors;

#[derive(Debug, Clone, Copy)]
pub struct PipelineParams {
    pub max_candidates: usize,
    pub max_chunk_candidates: usize,
    pub max_vector_candidates: usize,
    pub rrf_k: f64,
    pub rrf_depth: usize,
    pub mmr_lambda: f64,
    pub max_evidence_sections: usize,
    pub max_evidence_chars: usize,
    pub bm25: Bm25Params,
    pub vector: VectorLimits,
    pub pack_ttl_ms: i64,
}

impl From<&smartctx_config::SearchConfig> for PipelineParams {
    fn from(cfg: &smartctx_config::SearchConfig) -> Self {
        Self {
            max_candidates: cfg.max_candidates,
            max_chunk_candidates: cfg.max_chunk_candidates,
            max_vector_candidates: cfg.max_vector_candidates,
            rrf_k: cfg.rrf_k,
            rrf_depth: cfg.rrf_depth,
            mmr_lambda: cfg.mmr_lambda,
            max_evidence_sections: cfg.max_evidence_sections,
            max_evidence_chars: cfg.max_evidence_chars,
            bm25: Bm25Params {
                k1: cfg.bm25_k1,
                b: cfg.bm25_b,
                boost_heading: cfg.boost_heading,
                boost_section_path: cfg.boost_section_path,
                boost_text: cfg.boost_text,
            },
            vector: VectorLimits {
                max_chunks_to_embed: cfg.max_chunks_to_embed,
                max_time_ms: cfg.max_embedding_time_ms,
                batch_size: 16,
            },
            pack_ttl_ms: 86_400_000,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreBreakdown {
    pub bm25: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<f64>,
    pub rrf: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResultItem {
    pub chunk_id: String,
    pub path: String,
    pub range: LineRange,
    pub section_path: Vec<String>,
    pub preview: String,
    pub scores: ScoreBreakdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub pack_id: String,
    pub hit: bool,
    pub items: Vec<SearchResultItem>,
    pub degraded: bool,
    pub degradations: Vec<Degradation>,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub scope: SearchScope,
    pub max_results: usize,
    pub vector_enabled: bool,
    /// Absolute deadline for the whole request. When set and already past
    /// before vector ranking starts, vector ranking is skipped and the
    /// result is assembled lexical-only, marked `degraded`.
    pub deadline: Option<std::time::Instant>,
}

pub struct SearchPipeline {
    store: Arc<Store>,
    indexer: Arc<Indexer>,
    pack_cache: PackCache,
    provider: Arc<dyn EmbeddingProvider>,
    gate: ProviderGate,
    params: PipelineParams,
    root_fingerprint: String,
}

static METRICS_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(metrics?|analytics|telemetry|stats?)").unwrap());

const DOMAIN_BOOST_FACTOR: f64 = 1.15;
const DEGRADATION_SENTINEL: &str = "__degradations__";

impl SearchPipeline {
    pub fn new(
        store: Arc<Store>,
        indexer: Arc<Indexer>,
        provider: Arc<dyn EmbeddingProvider>,
        params: PipelineParams,
        cache_capacity: usize,
        max_provider_concurrency: usize,
        root_fingerprint: String,
    ) -> Self {
        Self {
            pack_cache: PackCache::new(store.clone(), cache_capacity),
            store,
            indexer,
            provider,
            gate: ProviderGate::new(max_provider_concurrency),
            params,
            root_fingerprint,
        }
    }

    fn pack_id(&self, req: &SearchRequest) -> String {
        let options = serde_json::json!({
            "scope": format!("{:?}", req.scope),
            "max_results": req.max_results,
            "vector_enabled": req.vector_enabled,
        });
        let canonical = serde_json::json!({
            "query": req.query,
            "options": options,
            "root": self.root_fingerprint,
        });
        // serde_json's `Map` is BTreeMap-backed without the `preserve_order`
        // feature, so keys are already lexicographically sorted — this is
        // already "canonical JSON" per §6.
        let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        hex::encode(digest)
    }

    pub async fn search(&self, req: SearchRequest, now_ms: i64) -> Result<SearchOutcome> {
        let pack_id = self.pack_id(&req);
        let params = self.params;
        let (pack, hit) = self
            .pack_cache
            .get_or_build(&pack_id, now_ms, || self.build(&req, &pack_id, now_ms, params))
            .await?;

        let items = pack
            .items
            .iter()
            .filter(|i| i.role == PackRole::Result)
            .map(|i| SearchResultItem {
                chunk_id: i.chunk_id.clone(),
                path: i.chunk_id.rsplit_once('#').map(|(p, _)| p.to_string()).unwrap_or_default(),
                range: i.range,
                section_path: i.section_path.clone(),
                preview: i.preview.clone(),
                scores: serde_json::from_value(i.scores.clone()).unwrap_or(ScoreBreakdown {
                    bm25: 0.0,
                    vector: None,
                    rrf: 0.0,
                }),
            })
            .collect();

        // Degradations travel inside the cached pack as a sentinel
        // `PackRole::Evidence` item so a cache hit still reports the
        // conditions the original build ran under.
        let degradations: Vec<Degradation> = pack
            .items
            .iter()
            .find(|i| i.role == PackRole::Evidence && i.chunk_id == DEGRADATION_SENTINEL)
            .and_then(|i| serde_json::from_value::<Vec<String>>(i.scores.clone()).ok())
            .unwrap_or_default()
            .into_iter()
            .map(|reason| Degradation { reason, detail: None })
            .collect();

        Ok(SearchOutcome {
            pack_id,
            hit,
            items,
            degraded: !degradations.is_empty(),
            degradations,
        })
    }

    async fn build(&self, req: &SearchRequest, pack_id: &str, now_ms: i64, params: PipelineParams) -> Result<EvidencePack> {
        let mut degradations = Vec::new();

        let files = collect_candidate_files(&self.store, &req.query, req.scope, params.max_candidates).await;
        let candidates = collect_candidate_chunks(&self.store, &self.indexer, &req.query, &files, params.max_chunk_candidates).await;
        degradations.extend(candidates.degradations);
        let chunks = candidates.chunks;

        let lexical = bm25f_rank(&req.query, &chunks, params.bm25);

        let deadline_exceeded = req.deadline.map(|d| std::time::Instant::now() >= d).unwrap_or(false);
        if deadline_exceeded {
            degradations.push(Degradation::new(smartctx_error::DegradationReason::BudgetExceeded));
        }

        let vector_scores = if req.vector_enabled && !deadline_exceeded && !lexical.is_empty() {
            let top_n = params.max_vector_candidates.min(lexical.len());
            let top_ids: HashSet<&str> = lexical.iter().take(top_n).map(|(id, _)| id.as_str()).collect();
            let vector_candidates: Vec<Chunk> = chunks.iter().filter(|c| top_ids.contains(c.id.as_str())).cloned().collect();
            let outcome = rank_vectors(&req.query, &vector_candidates, &self.provider, &self.gate, &self.store, params.vector).await;
            degradations.extend(outcome.degradations);
            if outcome.scores.is_empty() {
                None
            } else {
                Some(outcome.scores)
            }
        } else {
            None
        };

        let vector_ranked: Vec<(String, f64)> = vector_scores
            .as_ref()
            .map(|scores| {
                let mut v: Vec<(String, f64)> = scores.iter().map(|(k, v)| (k.clone(), *v)).collect();
                v.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
                v
            })
            .unwrap_or_default();

        let fused = reciprocal_rank_fusion(
            &lexical,
            if vector_scores.is_some() { Some(vector_ranked.as_slice()) } else { None },
            RrfParams { k: params.rrf_k, depth: params.rrf_depth },
        );

        let by_id: std::collections::HashMap<&str, &Chunk> = chunks.iter().map(|c| (c.id.as_str(), c)).collect();

        // Base ordering (§4.7 step 7): fused score when vectors contributed,
        // else BM25; domain boost for metrics-style paths is multiplicative.
        let mut ordered: Vec<(String, f64)> = if vector_scores.is_some() {
            fused.iter().map(|(id, f)| (id.clone(), f.rrf)).collect()
        } else {
            lexical.clone()
        };
        for (id, score) in ordered.iter_mut() {
            if let Some(chunk) = by_id.get(id.as_str()) {
                if METRICS_PATH.is_match(&chunk.path) {
                    *score *= DOMAIN_BOOST_FACTOR;
                }
            }
        }
        ordered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));

        let mmr_candidates: Vec<MmrCandidate> = ordered
            .iter()
            .enumerate()
            .filter_map(|(rank, (id, score))| {
                by_id.get(id.as_str()).map(|chunk| MmrCandidate {
                    chunk_id: id.clone(),
                    relevance: *score,
                    rank,
                    vector: None,
                    tokens: tokenize(&chunk.text).into_iter().collect(),
                })
            })
            .collect();

        let selected_order = diversify(&mmr_candidates, params.mmr_lambda, params.max_evidence_sections);

        let mut items = Vec::new();
        let mut char_budget = params.max_evidence_chars;
        let mut truncated = false;
        for (rank, id) in selected_order.iter().enumerate() {
            if items.len() >= params.max_evidence_sections {
                if rank < selected_order.len() {
                    truncated = true;
                }
                break;
            }
            let Some(chunk) = by_id.get(id.as_str()) else { continue };
            let preview_budget = char_budget.min(400);
            if preview_budget == 0 {
                truncated = true;
                break;
            }
            let preview = build_preview(&chunk.text, Some(&req.query), chunk.kind, preview_budget, smartctx_chunker::PREVIEW_LINE_CAP);
            let cost = preview.chars().count();
            if cost > char_budget {
                truncated = true;
                break;
            }
            char_budget -= cost;

            let fused_entry = fused.get(id.as_str());
            let bm25_score = fused_entry.and_then(|f| f.bm25_score).unwrap_or_else(|| {
                lexical.iter().find(|(cid, _)| cid == id).map(|(_, s)| *s).unwrap_or(0.0)
            });
            let vector_score = fused_entry.and_then(|f| f.vector_score);
            let rrf_score = fused_entry.map(|f| f.rrf).unwrap_or(0.0);

            items.push(PackItem {
                role: PackRole::Result,
                rank: rank as u32,
                chunk_id: chunk.id.clone(),
                range: chunk.range,
                section_path: chunk.section_path.clone(),
                preview,
                scores: serde_json::to_value(ScoreBreakdown {
                    bm25: bm25_score,
                    vector: vector_score,
                    rrf: rrf_score,
                })
                .unwrap_or(serde_json::Value::Null),
                staleness_token: chunk.content_hash.clone(),
            });
        }

        if truncated {
            degradations.push(Degradation::new(smartctx_error::DegradationReason::EvidenceTruncated));
        }

        tracing::debug!(pack_id, hits = items.len(), degradations = degradations.len(), "search pipeline built pack");

        if !degradations.is_empty() {
            let reasons: Vec<String> = degradations.iter().map(|d| d.reason.clone()).collect();
            items.push(PackItem {
                role: PackRole::Evidence,
                rank: u32::MAX,
                chunk_id: DEGRADATION_SENTINEL.to_string(),
                range: LineRange::new(1, 1),
                section_path: Vec::new(),
                preview: String::new(),
                scores: serde_json::to_value(reasons).unwrap_or(serde_json::Value::Null),
                staleness_token: String::new(),
            });
        }

        Ok(EvidencePack {
            pack_id: pack_id.to_string(),
            created_at: now_ms,
            expires_at: now_ms + params.pack_ttl_ms,
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::DisabledProvider;
    use smartctx_config::SearchConfig;
    use smartctx_graph::DependencyGraph;

    async fn build_pipeline(dir: &std::path::Path) -> SearchPipeline {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let graph = Arc::new(DependencyGraph::new(store.clone()));
        let indexer = Arc::new(Indexer::new(store.clone(), graph, dir.to_path_buf()));
        let params: PipelineParams = (&SearchConfig::default()).into();
        SearchPipeline::new(store, indexer, Arc::new(DisabledProvider), params, 10, 2, "fp".to_string())
    }

    #[tokio::test]
    async fn s1_search_hit_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/intro.md"), "# A\nintro body\n## B\nsection b body\n").unwrap();
        let pipeline = build_pipeline(dir.path()).await;
        pipeline.indexer.ensure_fresh("docs/intro.md").await.unwrap();

        let req = SearchRequest {
            query: "B".to_string(),
            scope: SearchScope::Docs,
            max_results: 3,
            vector_enabled: false,
            deadline: None,
        };
        let first = pipeline.search(req.clone(), 1_000).await.unwrap();
        assert!(!first.hit);
        assert_eq!(first.items.len(), 1);
        assert_eq!(first.items[0].section_path, vec!["A".to_string(), "B".to_string()]);
        assert!(first.items[0].scores.bm25 > 0.0);

        let second = pipeline.search(req, 1_001).await.unwrap();
        assert!(second.hit);
        assert_eq!(second.pack_id, first.pack_id);
    }

    #[tokio::test]
    async fn s2_staleness_invalidates_cache() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/intro.md"), "# A\nintro body\n## B\nsection b body\n").unwrap();
        let pipeline = build_pipeline(dir.path()).await;
        pipeline.indexer.ensure_fresh("docs/intro.md").await.unwrap();

        let req = SearchRequest {
            query: "B".to_string(),
            scope: SearchScope::Docs,
            max_results: 3,
            vector_enabled: false,
            deadline: None,
        };
        let first = pipeline.search(req.clone(), 1_000).await.unwrap();
        assert!(!first.hit);

        std::fs::write(dir.path().join("docs/intro.md"), "# A\nintro body\n## B\ncompletely different text\n").unwrap();
        pipeline.indexer.ensure_fresh("docs/intro.md").await.unwrap();

        let second = pipeline.search(req, 1_001).await.unwrap();
        assert!(!second.hit);
    }

    #[tokio::test]
    async fn s3_disabled_provider_degrades_and_survives_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/intro.md"), "# A\nintro body\n## B\nsection b body\n").unwrap();
        let pipeline = build_pipeline(dir.path()).await;
        pipeline.indexer.ensure_fresh("docs/intro.md").await.unwrap();

        let req = SearchRequest {
            query: "B".to_string(),
            scope: SearchScope::Docs,
            max_results: 3,
            vector_enabled: true,
            deadline: None,
        };
        let first = pipeline.search(req.clone(), 1_000).await.unwrap();
        assert!(first.degraded);
        assert!(first.degradations.iter().any(|d| d.reason == "vector_disabled"));

        let second = pipeline.search(req, 1_001).await.unwrap();
        assert!(second.hit);
        assert!(second.degraded);
        assert_eq!(second.degradations.len(), first.degradations.len());
    }
}
