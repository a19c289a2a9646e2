//! Deterministic preview/summary builder (§4.2).
//!
//! Scores each non-empty line of a chunk, picks the highest scoring lines
//! (in original order) within a char budget and a line cap, and falls back
//! to a truncated prefix when nothing scores positively. Same inputs always
//! produce byte-identical output, which is what lets evidence packs cache.

use once_cell::sync::Lazy;
use regex::Regex;
use smartctx_store::ChunkKind;

pub const PREVIEW_LINE_CAP: usize = 8;
pub const SUMMARY_LINE_CAP: usize = 3;

static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+").unwrap());
static ADMONITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*>?\s*(note|warning|tip|caution|important):").unwrap());
static DOC_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"@(param|return|returns|throws|see|example|deprecated)\b").unwrap());
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s{0,3}#{1,6}\s").unwrap());
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9_]+").unwrap());

fn tokenize_lower(s: &str) -> Vec<String> {
    WORD.find_iter(s).map(|m| m.as_str().to_lowercase()).collect()
}

fn score_line(line: &str, kind: ChunkKind, query_tokens: &[String]) -> i32 {
    let mut score = 0i32;
    if HEADING.is_match(line) {
        score += 4;
    }
    if BULLET.is_match(line) {
        score += 3;
    }
    if ADMONITION.is_match(line) {
        score += 3;
    }
    if kind == ChunkKind::CodeComment && DOC_TAG.is_match(line) {
        score += 4;
    }
    if !query_tokens.is_empty() {
        let line_tokens = tokenize_lower(line);
        let matches = line_tokens
            .iter()
            .filter(|t| query_tokens.contains(t))
            .count() as i32;
        if matches > 0 {
            score += 6 + matches;
        }
    }
    let len = line.chars().count();
    if len > 500 {
        score -= 5;
    } else if len > 220 {
        score -= 2;
    }
    score
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builds a preview (cap = [`PREVIEW_LINE_CAP`]) or summary (cap =
/// [`SUMMARY_LINE_CAP`]) per the deterministic scoring rule in §4.2.
pub fn build_preview(text: &str, query: Option<&str>, kind: ChunkKind, max_chars: usize, line_cap: usize) -> String {
    let query_tokens: Vec<String> = query.map(tokenize_lower).unwrap_or_default();

    let scored: Vec<(usize, &str, i32)> = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| (i, l, score_line(l, kind, &query_tokens)))
        .collect();

    let any_positive = scored.iter().any(|(_, _, s)| *s > 0);

    if !any_positive {
        let collapsed = collapse_whitespace(text);
        return truncate_with_ellipsis(&collapsed, max_chars);
    }

    // Stable sort by score desc, then by original order (line index asc) to
    // keep the construction deterministic on ties.
    let mut ranked = scored.clone();
    ranked.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));

    let mut picked: Vec<(usize, &str)> = Vec::new();
    let mut budget = max_chars;
    for (idx, line, score) in ranked {
        if score <= 0 {
            break;
        }
        if picked.len() >= line_cap {
            break;
        }
        let cost = line.chars().count() + if picked.is_empty() { 0 } else { 1 };
        if cost > budget {
            continue;
        }
        budget -= cost;
        picked.push((idx, line));
    }

    if picked.is_empty() {
        let collapsed = collapse_whitespace(text);
        return truncate_with_ellipsis(&collapsed, max_chars);
    }

    picked.sort_by_key(|(idx, _)| *idx);
    let joined = picked
        .into_iter()
        .map(|(_, l)| l.trim())
        .collect::<Vec<_>>()
        .join("\n");
    truncate_with_ellipsis(&joined, max_chars)
}

fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let take = max_chars.saturating_sub(1).max(1);
    let mut out: String = s.chars().take(take).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_repeated_calls() {
        let text = "plain line one\n# A Heading\n- a bullet point\nanother plain line";
        let a = build_preview(text, None, ChunkKind::Markdown, 200, PREVIEW_LINE_CAP);
        let b = build_preview(text, None, ChunkKind::Markdown, 200, PREVIEW_LINE_CAP);
        assert_eq!(a, b);
    }

    #[test]
    fn respects_max_chars_bound() {
        let text = "# Heading one that is fairly long for a test\n- bullet one\n- bullet two\n- bullet three";
        let preview = build_preview(text, None, ChunkKind::Markdown, 20, PREVIEW_LINE_CAP);
        assert!(preview.chars().count() <= 20);
    }

    #[test]
    fn falls_back_to_prefix_when_nothing_scores() {
        let text = "x\ny\nz";
        let preview = build_preview(text, None, ChunkKind::Text, 2, PREVIEW_LINE_CAP);
        assert!(preview.chars().count() <= 2);
    }

    #[test]
    fn query_tokens_boost_matching_lines() {
        let text = "alpha line\nbeta gamma line\ndelta line";
        let preview = build_preview(text, Some("gamma"), ChunkKind::Text, 200, PREVIEW_LINE_CAP);
        assert!(preview.contains("gamma"));
    }
}
