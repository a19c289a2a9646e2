//! Reciprocal Rank Fusion (§4.7 step 6, GLOSSARY "RRF").

use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct RrfParams {
    pub k: f64,
    pub depth: usize,
}

impl Default for RrfParams {
    fn default() -> Self {
        Self { k: 60.0, depth: 200 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FusedScore {
    pub rrf: f64,
    pub bm25_rank: Option<usize>,
    pub bm25_score: Option<f64>,
    pub vector_rank: Option<usize>,
    pub vector_score: Option<f64>,
}

/// Fuses lexical and (optional) vector rankings. Each input is assumed
/// already sorted best-first; only the first `params.depth` entries of each
/// contribute `1/(k+rank)` (1-based rank) to the fused score.
pub fn reciprocal_rank_fusion(
    lexical: &[(String, f64)],
    vector: Option<&[(String, f64)]>,
    params: RrfParams,
) -> HashMap<String, FusedScore> {
    let mut fused: HashMap<String, FusedScore> = HashMap::new();

    for (rank, (chunk_id, score)) in lexical.iter().enumerate() {
        let rank_1based = rank + 1;
        let entry = fused.entry(chunk_id.clone()).or_default();
        entry.bm25_rank = Some(rank_1based);
        entry.bm25_score = Some(*score);
        if rank_1based <= params.depth {
            entry.rrf += 1.0 / (params.k + rank_1based as f64);
        }
    }

    if let Some(vector) = vector {
        for (rank, (chunk_id, score)) in vector.iter().enumerate() {
            let rank_1based = rank + 1;
            let entry = fused.entry(chunk_id.clone()).or_default();
            entry.vector_rank = Some(rank_1based);
            entry.vector_score = Some(*score);
            if rank_1based <= params.depth {
                entry.rrf += 1.0 / (params.k + rank_1based as f64);
            }
        }
    }

    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuses_overlapping_rankings() {
        let lexical = vec![("a".to_string(), 5.0), ("b".to_string(), 3.0)];
        let vector = vec![("b".to_string(), 0.9), ("a".to_string(), 0.5)];
        let fused = reciprocal_rank_fusion(&lexical, Some(&vector), RrfParams::default());
        assert_eq!(fused.len(), 2);
        // b is rank 2 lexical + rank 1 vector: 1/62 + 1/61
        let b = &fused["b"];
        assert!((b.rrf - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-9);
    }

    #[test]
    fn entries_beyond_depth_get_no_rrf_contribution() {
        let lexical: Vec<(String, f64)> = (0..5).map(|i| (format!("c{i}"), 1.0)).collect();
        let fused = reciprocal_rank_fusion(&lexical, None, RrfParams { k: 60.0, depth: 2 });
        assert!(fused["c0"].rrf > 0.0);
        assert_eq!(fused["c4"].rrf, 0.0);
    }
}
