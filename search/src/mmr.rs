//! MMR diversification (C7 step 8, §4.7, GLOSSARY "MMR"): greedy selection
//! maximizing `λ·relevance − (1−λ)·max_similarity_to_selected`.
//!
//! Similarity uses stored vectors when both candidates have one, else
//! Jaccard over token sets (§4.7). Ties break by original relevance rank,
//! then by chunk id lexicographically (§9 "Ordering inside MMR on ties" —
//! the invariant required by scenario S1).

use std::collections::HashSet;

use crate::vector::cosine_similarity;

#[derive(Debug, Clone)]
pub struct MmrCandidate {
    pub chunk_id: String,
    pub relevance: f64,
    /// 0-based position in the incoming base ordering.
    pub rank: usize,
    pub vector: Option<Vec<f32>>,
    pub tokens: HashSet<String>,
}

fn similarity(a: &MmrCandidate, b: &MmrCandidate) -> f64 {
    if let (Some(va), Some(vb)) = (&a.vector, &b.vector) {
        return cosine_similarity(va, vb).max(0.0);
    }
    jaccard(&a.tokens, &b.tokens)
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 { 0.0 } else { intersection / union }
}

/// Greedily selects up to `limit` chunk ids, then appends the remaining
/// candidates (not selected) in their original order, per §4.7 step 8.
pub fn diversify(candidates: &[MmrCandidate], lambda: f64, limit: usize) -> Vec<String> {
    if candidates.is_empty() {
        return Vec::new();
    }
    let mut remaining: Vec<&MmrCandidate> = candidates.iter().collect();
    let mut selected: Vec<&MmrCandidate> = Vec::new();

    let take = limit.min(candidates.len());
    for _ in 0..take {
        let mut best_idx = 0usize;
        let mut best_score = f64::NEG_INFINITY;
        for (idx, cand) in remaining.iter().enumerate() {
            let max_sim = selected.iter().map(|s| similarity(cand, s)).fold(0.0_f64, f64::max);
            let score = lambda * cand.relevance - (1.0 - lambda) * max_sim;
            let better = score > best_score
                || (score == best_score
                    && tie_break(&remaining[best_idx], cand) == std::cmp::Ordering::Greater);
            if better {
                best_score = score;
                best_idx = idx;
            }
        }
        selected.push(remaining.remove(best_idx));
    }

    let mut out: Vec<String> = selected.iter().map(|c| c.chunk_id.clone()).collect();
    remaining.sort_by(|a, b| tie_break(a, b));
    out.extend(remaining.iter().map(|c| c.chunk_id.clone()));
    out
}

/// Orders by original relevance rank ascending, then chunk id
/// lexicographically — `a` preferred (Less) when it should sort first.
fn tie_break(a: &MmrCandidate, b: &MmrCandidate) -> std::cmp::Ordering {
    a.rank.cmp(&b.rank).then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(id: &str, rank: usize, relevance: f64, tokens: &[&str]) -> MmrCandidate {
        MmrCandidate {
            chunk_id: id.to_string(),
            relevance,
            rank,
            vector: None,
            tokens: tokens.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn lambda_one_matches_relevance_order() {
        let candidates = vec![
            cand("a", 0, 0.9, &["x"]),
            cand("b", 1, 0.5, &["x"]),
            cand("c", 2, 0.1, &["y"]),
        ];
        let result = diversify(&candidates, 1.0, 3);
        assert_eq!(result, vec!["a", "b", "c"]);
    }

    #[test]
    fn lambda_zero_prefers_least_similar_each_step() {
        let candidates = vec![
            cand("a", 0, 0.9, &["x", "y"]),
            cand("b", 1, 0.8, &["x", "y"]), // near-duplicate of a
            cand("c", 2, 0.1, &["z"]),      // distinct
        ];
        let result = diversify(&candidates, 0.0, 3);
        // First pick: all have zero similarity to an empty selected set, so
        // relevance-rank tie-break picks "a" first; second pick should be
        // the most dissimilar to "a", i.e. "c", not the near-duplicate "b".
        assert_eq!(result[0], "a");
        assert_eq!(result[1], "c");
    }

    #[test]
    fn limit_below_candidate_count_appends_remainder_in_original_order() {
        let candidates = vec![cand("a", 0, 0.9, &["x"]), cand("b", 1, 0.5, &["y"]), cand("c", 2, 0.3, &["z"])];
        let result = diversify(&candidates, 1.0, 1);
        assert_eq!(result, vec!["a", "b", "c"]);
    }
}
