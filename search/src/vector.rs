//! Vector Ranker (C6, §4.6) and the embedding provider capability boundary
//! (§9 "Embedding provider"): `{ provider_name, model_name, dims, embed,
//! timeout_hint }`. Concrete providers (local, remote, disabled-null)
//! implement [`EmbeddingProvider`]; degradation reasons all flow through it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use smartctx_error::Degradation;
use smartctx_error::DegradationReason;
use smartctx_store::Chunk;
use smartctx_store::Embedding;
use smartctx_store::Store;
use tokio::sync::Semaphore;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn provider_name(&self) -> &str;
    fn model_name(&self) -> &str;
    fn dims(&self) -> u32;
    fn timeout_hint(&self) -> Duration;

    /// Embed a batch of texts; one vector per input, same order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, String>;
}

/// The null/disabled provider: always reports `vector_disabled` and never
/// actually calls out. Used when no real provider is configured.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn provider_name(&self) -> &str {
        "disabled"
    }
    fn model_name(&self) -> &str {
        "none"
    }
    fn dims(&self) -> u32 {
        0
    }
    fn timeout_hint(&self) -> Duration {
        Duration::from_millis(0)
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, String> {
        Err("vector search disabled".to_string())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VectorLimits {
    pub max_chunks_to_embed: usize,
    pub max_time_ms: u64,
    pub batch_size: usize,
}

impl Default for VectorLimits {
    fn default() -> Self {
        Self {
            max_chunks_to_embed: 64,
            max_time_ms: 3_000,
            batch_size: 16,
        }
    }
}

pub struct VectorOutcome {
    pub scores: HashMap<String, f64>,
    pub degradations: Vec<Degradation>,
}

/// Per-request concurrency guard: each in-flight search holds at most one
/// embedding-provider permit (§5 shared-resource policy).
pub struct ProviderGate {
    semaphore: Semaphore,
}

impl ProviderGate {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            semaphore: Semaphore::new(max_concurrency.max(1)),
        }
    }
}

/// Runs the vector ranking procedure of §4.6: embed the query once, look up
/// stored embeddings for existing chunks, lazily embed up to
/// `limits.max_chunks_to_embed` missing chunks within `limits.max_time_ms`,
/// writing results through to `store`, and return cosine similarities.
pub async fn rank_vectors(
    query: &str,
    candidates: &[Chunk],
    provider: &Arc<dyn EmbeddingProvider>,
    gate: &ProviderGate,
    store: &Store,
    limits: VectorLimits,
) -> VectorOutcome {
    let _permit = match gate.semaphore.acquire().await {
        Ok(p) => p,
        Err(_) => {
            return VectorOutcome {
                scores: HashMap::new(),
                degradations: vec![Degradation::new(DegradationReason::VectorDisabled)],
            };
        }
    };

    let start = Instant::now();
    let deadline = Duration::from_millis(limits.max_time_ms.max(1));

    let query_vec = match tokio::time::timeout(deadline, provider.embed(&[query.to_string()])).await {
        Ok(Ok(mut vecs)) if !vecs.is_empty() => vecs.remove(0),
        Ok(Ok(_)) | Ok(Err(_)) => {
            return VectorOutcome {
                scores: HashMap::new(),
                degradations: vec![Degradation::new(DegradationReason::VectorDisabled)],
            };
        }
        Err(_) => {
            return VectorOutcome {
                scores: HashMap::new(),
                degradations: vec![Degradation::new(DegradationReason::EmbeddingTimeout)],
            };
        }
    };

    let mut scores = HashMap::new();
    let mut missing: Vec<&Chunk> = Vec::new();
    for c in candidates {
        match store.get_embedding(&c.id, provider.provider_name(), provider.model_name()).await {
            Ok(Some(emb)) => {
                scores.insert(c.id.clone(), cosine_similarity(&query_vec, &emb.vector));
            }
            Ok(None) => missing.push(c),
            Err(e) => tracing::warn!(chunk_id = %c.id, error = %e, "vector ranker: embedding lookup failed"),
        }
    }

    let mut degradations = Vec::new();
    let to_embed: Vec<&Chunk> = missing.into_iter().take(limits.max_chunks_to_embed).collect();
    let mut embedded_count = 0usize;
    let mut truncated_by_time = false;

    for batch in to_embed.chunks(limits.batch_size.max(1)) {
        let elapsed = start.elapsed();
        if elapsed >= deadline {
            truncated_by_time = true;
            break;
        }
        let remaining = deadline - elapsed;
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        match tokio::time::timeout(remaining, provider.embed(&texts)).await {
            Ok(Ok(vectors)) if vectors.len() == batch.len() => {
                for (chunk, vector) in batch.iter().zip(vectors) {
                    let cos = cosine_similarity(&query_vec, &vector);
                    scores.insert(chunk.id.clone(), cos);
                    let embedding = Embedding::new(
                        chunk.id.clone(),
                        provider.provider_name().to_string(),
                        provider.model_name().to_string(),
                        vector,
                    );
                    if let Err(e) = store.upsert_embedding(embedding).await {
                        tracing::warn!(chunk_id = %chunk.id, error = %e, "vector ranker: failed to persist embedding");
                    }
                    embedded_count += 1;
                }
            }
            Ok(Ok(_)) | Ok(Err(_)) => {
                tracing::warn!("vector ranker: embedding batch failed");
            }
            Err(_) => {
                truncated_by_time = true;
                break;
            }
        }
    }

    if truncated_by_time && embedded_count > 0 {
        degradations.push(Degradation::new(DegradationReason::EmbeddingPartial));
    } else if truncated_by_time {
        degradations.push(Degradation::new(DegradationReason::EmbeddingTimeout));
    }

    VectorOutcome { scores, degradations }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let na: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let nb: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_of_orthogonal_vectors_is_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    struct StubProvider;

    #[async_trait]
    impl EmbeddingProvider for StubProvider {
        fn provider_name(&self) -> &str {
            "stub"
        }
        fn model_name(&self) -> &str {
            "v1"
        }
        fn dims(&self) -> u32 {
            2
        }
        fn timeout_hint(&self) -> Duration {
            Duration::from_millis(500)
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, String> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn rank_vectors_embeds_missing_chunks_and_persists() {
        use smartctx_store::ChunkKind;
        use smartctx_store::LineRange;

        let store = Store::open_in_memory().unwrap();
        let chunk = Chunk {
            id: "c1".into(),
            path: "a.md".into(),
            kind: ChunkKind::Markdown,
            section_path: vec![],
            heading: None,
            heading_level: None,
            range: LineRange::new(1, 1),
            text: "hello".into(),
            content_hash: "h".into(),
        };
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(StubProvider);
        let gate = ProviderGate::new(2);
        let outcome = rank_vectors("hello", &[chunk.clone()], &provider, &gate, &store, VectorLimits::default()).await;
        assert!(outcome.scores.contains_key("c1"));
        assert!(store.get_embedding("c1", "stub", "v1").await.unwrap().is_some());
    }
}
