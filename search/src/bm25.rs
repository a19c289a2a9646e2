//! Lexical Ranker (C5, §4.5): BM25F over a candidate chunk set.
//!
//! Corpus statistics (`avgdl`, document frequency) are computed over the
//! candidate set passed in, not globally — ranking is stable per query and
//! doesn't drift as the rest of the project is indexed (§4.5).

use std::collections::HashMap;

use smartctx_store::Chunk;

use crate::tokenize::tokenize;

#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    pub boost_heading: f64,
    pub boost_section_path: f64,
    pub boost_text: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            boost_heading: 2.5,
            boost_section_path: 1.5,
            boost_text: 1.0,
        }
    }
}

struct FieldedDoc {
    chunk_id: String,
    /// (field boost, tokens) pairs; a token can appear in more than one
    /// field (e.g. a heading word also appears in `text`).
    fields: Vec<(f64, Vec<String>)>,
    length: f64,
}

/// Ranks `candidates` against `query`, returning `(chunk_id, score)` pairs
/// sorted by score descending, ties broken by chunk id (stable iteration
/// order per §5).
pub fn bm25f_rank(query: &str, candidates: &[Chunk], params: Bm25Params) -> Vec<(String, f64)> {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() || candidates.is_empty() {
        return Vec::new();
    }

    let docs: Vec<FieldedDoc> = candidates
        .iter()
        .map(|c| {
            let heading_tokens = c.heading.as_deref().map(tokenize).unwrap_or_default();
            let section_tokens = tokenize(&c.section_path.join(" "));
            let text_tokens = tokenize(&c.text);
            let length = (heading_tokens.len() + section_tokens.len() + text_tokens.len()) as f64;
            FieldedDoc {
                chunk_id: c.id.clone(),
                fields: vec![
                    (params.boost_heading, heading_tokens),
                    (params.boost_section_path, section_tokens),
                    (params.boost_text, text_tokens),
                ],
                length,
            }
        })
        .collect();

    let n = docs.len() as f64;
    let avgdl = docs.iter().map(|d| d.length).sum::<f64>() / n.max(1.0);

    // Document frequency per query token, computed over this candidate set.
    let mut df: HashMap<&str, u32> = HashMap::new();
    for token in &query_tokens {
        let count = docs
            .iter()
            .filter(|d| d.fields.iter().any(|(_, toks)| toks.contains(token)))
            .count() as u32;
        df.insert(token.as_str(), count);
    }

    let mut scores: Vec<(String, f64)> = docs
        .iter()
        .map(|doc| {
            let mut score = 0.0f64;
            for token in &query_tokens {
                let freq = df.get(token.as_str()).copied().unwrap_or(0) as f64;
                if freq == 0.0 {
                    continue;
                }
                let idf = ((n - freq + 0.5) / (freq + 0.5) + 1.0).ln();

                let weighted_tf: f64 = doc
                    .fields
                    .iter()
                    .map(|(boost, toks)| {
                        let tf = toks.iter().filter(|t| *t == token).count() as f64;
                        boost * tf
                    })
                    .sum();
                if weighted_tf == 0.0 {
                    continue;
                }
                let denom = weighted_tf + params.k1 * (1.0 - params.b + params.b * (doc.length / avgdl.max(1e-9)));
                score += idf * (weighted_tf * (params.k1 + 1.0)) / denom.max(1e-9);
            }
            (doc.chunk_id.clone(), score)
        })
        .filter(|(_, score)| *score > 0.0)
        .collect();

    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartctx_store::ChunkKind;
    use smartctx_store::LineRange;

    fn chunk(id: &str, heading: Option<&str>, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            path: "f.md".to_string(),
            kind: ChunkKind::Markdown,
            section_path: heading.map(|h| vec![h.to_string()]).unwrap_or_default(),
            heading: heading.map(|s| s.to_string()),
            heading_level: Some(1),
            range: LineRange::new(1, 2),
            text: text.to_string(),
            content_hash: "h".to_string(),
        }
    }

    #[test]
    fn ranks_heading_matches_above_body_only_matches() {
        let docs = vec![
            chunk("a", Some("unrelated"), "mentions widgets in passing"),
            chunk("b", Some("widgets"), "a section about other things"),
        ];
        let ranked = bm25f_rank("widgets", &docs, Bm25Params::default());
        assert_eq!(ranked[0].0, "b");
    }

    #[test]
    fn empty_query_yields_no_results() {
        let docs = vec![chunk("a", None, "text")];
        assert!(bm25f_rank("", &docs, Bm25Params::default()).is_empty());
    }

    #[test]
    fn non_matching_query_yields_no_results() {
        let docs = vec![chunk("a", None, "alpha beta")];
        assert!(bm25f_rank("zzz", &docs, Bm25Params::default()).is_empty());
    }
}
