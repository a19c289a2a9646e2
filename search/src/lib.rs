//! Hybrid search: lexical (BM25F) + vector ranking, fused by RRF and
//! diversified by MMR, shaped into cached evidence packs (§4.5–§4.7).

mod bm25;
mod candidates;
mod fusion;
mod mmr;
mod pack_cache;
mod pipeline;
mod tokenize;
mod vector;

pub use bm25::Bm25Params;
pub use bm25::bm25f_rank;
pub use candidates::CandidateChunks;
pub use candidates::SearchScope;
pub use candidates::collect_candidate_chunks;
pub use candidates::collect_candidate_files;
pub use fusion::FusedScore;
pub use fusion::RrfParams;
pub use fusion::reciprocal_rank_fusion;
pub use mmr::MmrCandidate;
pub use mmr::diversify;
pub use pack_cache::PackCache;
pub use pipeline::PipelineParams;
pub use pipeline::ScoreBreakdown;
pub use pipeline::SearchOutcome;
pub use pipeline::SearchPipeline;
pub use pipeline::SearchRequest;
pub use pipeline::SearchResultItem;
pub use tokenize::tokenize;
pub use vector::DisabledProvider;
pub use vector::EmbeddingProvider;
pub use vector::ProviderGate;
pub use vector::VectorLimits;
pub use vector::VectorOutcome;
pub use vector::cosine_similarity;
pub use vector::rank_vectors;
