//! Edit target locator (§4.8, §9 "Ambiguity of the match locator"): a pure
//! function `locate(file_text, edit) -> Result<TextRange>` independent of
//! any I/O, so every fuzzy strategy is exercised directly by unit tests.

use smartctx_error::Error;
use smartctx_error::ErrorCode;
use smartctx_error::Result;

use crate::types::EditDescriptor;
use crate::types::FuzzyMode;
use crate::types::LineWindow;
use crate::types::TextRange;

/// (start_byte, end_byte_exclusive-of-newline) per 1-based line.
pub(crate) fn line_byte_offsets(text: &str) -> Vec<(usize, usize)> {
    let mut offsets = Vec::new();
    let mut start = 0usize;
    for (i, ch) in text.char_indices() {
        if ch == '\n' {
            offsets.push((start, i));
            start = i + 1;
        }
    }
    offsets.push((start, text.len()));
    offsets
}

fn window_bytes(text: &str, window: Option<LineWindow>) -> (usize, usize) {
    let offsets = line_byte_offsets(text);
    match window {
        None => (0, text.len()),
        Some(w) => {
            let start_idx = w.start_line.saturating_sub(1) as usize;
            let end_idx = w.end_line.saturating_sub(1) as usize;
            let start = offsets.get(start_idx).map(|(s, _)| *s).unwrap_or(text.len());
            let end = offsets.get(end_idx).map(|(_, e)| *e).unwrap_or(text.len());
            (start, end.max(start))
        }
    }
}

fn byte_to_line(text: &str, byte: usize) -> u32 {
    text.as_bytes()[..byte.min(text.len())].iter().filter(|&&b| b == b'\n').count() as u32 + 1
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn exact_matches(haystack: &str, needle: &str) -> Vec<(usize, usize)> {
    if needle.is_empty() {
        return Vec::new();
    }
    let mut matches = Vec::new();
    let mut start = 0;
    while start <= haystack.len() {
        match haystack[start..].find(needle) {
            Some(pos) => {
                let abs = start + pos;
                matches.push((abs, abs + needle.len()));
                start = abs + 1;
            }
            None => break,
        }
    }
    matches
}

/// Maps every byte offset of the whitespace-normalized text back to a byte
/// offset in the original, so a match found in normalized space can be
/// translated back to a real range.
fn build_normalized_with_map(s: &str) -> (String, Vec<usize>) {
    let mut out = String::new();
    let mut map = Vec::new();
    let mut in_ws = false;
    for (idx, ch) in s.char_indices() {
        if ch.is_whitespace() {
            if !in_ws {
                map.push(idx);
                out.push(' ');
                in_ws = true;
            }
        } else {
            let before = out.len();
            out.push(ch);
            for k in 0..(out.len() - before) {
                map.push(idx + k);
            }
            in_ws = false;
        }
    }
    map.push(s.len());
    (out, map)
}

fn whitespace_matches(haystack: &str, needle: &str) -> Vec<(usize, usize)> {
    let needle_norm = normalize_whitespace(needle);
    if needle_norm.is_empty() {
        return Vec::new();
    }
    let (normalized, map) = build_normalized_with_map(haystack);
    let mut matches = Vec::new();
    let mut start = 0;
    while start <= normalized.len() {
        match normalized[start..].find(needle_norm.as_str()) {
            Some(pos) => {
                let ns = start + pos;
                let ne = ns + needle_norm.len();
                matches.push((map[ns], map[ne]));
                start = ns + 1;
            }
            None => break,
        }
    }
    matches
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Distance budget proportional to target length (§4.8 step 4): at least 1,
/// otherwise a fifth of the normalized target's character count.
fn levenshtein_budget(target: &str) -> usize {
    (normalize_whitespace(target).chars().count() / 5).max(1)
}

/// Trims a byte span down to its first/last non-whitespace byte, so windows
/// that differ only by how much trailing/leading whitespace they swept in
/// collapse to the same candidate.
fn trim_span(haystack: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let slice = &haystack[start..end];
    let trim_start = slice.find(|c: char| !c.is_whitespace())?;
    let trim_end = slice.rfind(|c: char| !c.is_whitespace())? + 1;
    Some((start + trim_start, start + trim_end))
}

/// Slides a line-aligned window across `haystack`, scoring each candidate
/// span against `needle` (both whitespace-normalized) and keeping the
/// spans tied for the lowest distance within `budget`.
fn levenshtein_matches(haystack: &str, needle: &str, budget: usize) -> Vec<(usize, usize)> {
    let needle_norm = normalize_whitespace(needle);
    if needle_norm.is_empty() {
        return Vec::new();
    }
    let offsets = line_byte_offsets(haystack);
    let mut candidates: Vec<(usize, usize, usize)> = Vec::new();
    for i in 0..offsets.len() {
        for j in i..offsets.len() {
            let (start, _) = offsets[i];
            let (_, end) = offsets[j];
            if end <= start {
                continue;
            }
            let window_norm = normalize_whitespace(&haystack[start..end]);
            if window_norm.is_empty() {
                continue;
            }
            let len_diff = window_norm.chars().count().abs_diff(needle_norm.chars().count());
            if len_diff > budget {
                continue;
            }
            let dist = levenshtein(&window_norm, &needle_norm);
            if dist > budget {
                continue;
            }
            let Some((ts, te)) = trim_span(haystack, start, end) else { continue };
            candidates.push((ts, te, dist));
        }
    }
    let Some(best_dist) = candidates.iter().map(|(_, _, d)| *d).min() else {
        return Vec::new();
    };
    let mut out: Vec<(usize, usize)> = Vec::new();
    for (s, e, d) in candidates {
        if d == best_dist && !out.contains(&(s, e)) {
            out.push((s, e));
        }
    }
    out
}

fn context_ok(haystack: &str, m: (usize, usize), before: Option<&str>, after: Option<&str>) -> bool {
    let before_ok = before
        .map(|b| {
            let prefix = normalize_whitespace(&haystack[..m.0]);
            let b_norm = normalize_whitespace(b);
            !b_norm.is_empty() && prefix.ends_with(&b_norm)
        })
        .unwrap_or(true);
    let after_ok = after
        .map(|a| {
            let suffix = normalize_whitespace(&haystack[m.1..]);
            let a_norm = normalize_whitespace(a);
            !a_norm.is_empty() && suffix.starts_with(&a_norm)
        })
        .unwrap_or(true);
    before_ok && after_ok
}

/// Locates the single range `edit.target_string` should replace, per the
/// matching policy of §4.8. Does not itself read `expected_hash` — callers
/// check that against the current file hash before invoking this.
pub fn locate(file_text: &str, edit: &EditDescriptor) -> Result<TextRange> {
    let target = edit
        .target_string
        .as_deref()
        .ok_or_else(|| Error::coded(ErrorCode::EditFailed, "replace edit requires target_string"))?;

    let window = edit.line_range.or(edit.anchor_search_range);
    let (win_start, win_end) = window_bytes(file_text, window);
    let haystack = &file_text[win_start..win_end];

    let mut matches = exact_matches(haystack, target);
    if matches.len() != 1 {
        matches = match edit.fuzzy_mode {
            Some(FuzzyMode::Levenshtein) => levenshtein_matches(haystack, target, levenshtein_budget(target)),
            Some(FuzzyMode::Whitespace) | None => whitespace_matches(haystack, target),
        };
    }

    if matches.len() > 1 && (edit.before_context.is_some() || edit.after_context.is_some()) {
        matches.retain(|m| context_ok(haystack, *m, edit.before_context.as_deref(), edit.after_context.as_deref()));
    }

    match matches.len() {
        0 => Err(Error::coded(ErrorCode::EditFailed, format!("no match found for target_string in {}", edit.file))),
        1 => {
            let (s, e) = matches[0];
            let start_byte = win_start + s;
            let end_byte = win_start + e;
            Ok(TextRange {
                start_byte,
                end_byte,
                start_line: byte_to_line(file_text, start_byte),
                end_line: byte_to_line(file_text, end_byte.max(start_byte).saturating_sub(1).max(start_byte)),
            })
        }
        _ => {
            let lines: Vec<u32> = matches.iter().map(|(s, _)| byte_to_line(file_text, win_start + s)).collect();
            Err(Error::coded(ErrorCode::AmbiguousMatch, format!("target_string matched {} locations in {}", matches.len(), edit.file))
                .with_details(serde_json::json!({ "lines": lines })))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EditOperation;

    fn edit(target: &str) -> EditDescriptor {
        EditDescriptor {
            file: "a.txt".to_string(),
            operation: EditOperation::Replace,
            target_string: Some(target.to_string()),
            replacement_string: Some("X".to_string()),
            line_range: None,
            before_context: None,
            after_context: None,
            fuzzy_mode: None,
            anchor_search_range: None,
            expected_hash: None,
            insert_mode: None,
            insert_line_range: None,
            confirmation_hash: None,
            safety_level: Default::default(),
        }
    }

    #[test]
    fn exact_single_match() {
        let range = locate("hello world", &edit("hello")).unwrap();
        assert_eq!((range.start_byte, range.end_byte), (0, 5));
        assert_eq!(range.start_line, 1);
    }

    #[test]
    fn whitespace_fuzzy_match() {
        let text = "fn foo()   {\n    bar();\n}\n";
        let mut e = edit("fn foo() {");
        e.fuzzy_mode = Some(FuzzyMode::Whitespace);
        let range = locate(text, &e).unwrap();
        assert_eq!(&text[range.start_byte..range.end_byte].split_whitespace().collect::<Vec<_>>().join(" "), "fn foo() {");
    }

    #[test]
    fn levenshtein_fuzzy_match_within_budget() {
        let text = "const value = compute();\n";
        let mut e = edit("const value = compute() ;");
        e.fuzzy_mode = Some(FuzzyMode::Levenshtein);
        let range = locate(text, &e).unwrap();
        assert_eq!(&text[range.start_byte..range.end_byte], "const value = compute();");
    }

    #[test]
    fn ambiguous_exact_matches_without_context_fails() {
        let text = "x=1\nx=1\n";
        let err = locate(text, &edit("x=1")).unwrap_err();
        assert_eq!(err.code(), smartctx_error::ErrorCode::AmbiguousMatch);
    }

    #[test]
    fn before_context_disambiguates() {
        let text = "a\nx=1\nb\nx=1\nc\n";
        let mut e = edit("x=1");
        e.before_context = Some("b".to_string());
        let range = locate(text, &e).unwrap();
        assert_eq!(&text[range.start_byte..range.end_byte], "x=1");
        assert_eq!(range.start_line, 4);
    }

    #[test]
    fn line_range_restricts_search_window() {
        let text = "x=1\nunrelated\nx=1\n";
        let mut e = edit("x=1");
        e.line_range = Some(LineWindow { start_line: 3, end_line: 3 });
        let range = locate(text, &e).unwrap();
        assert_eq!(range.start_line, 3);
    }

    #[test]
    fn no_match_is_edit_failed() {
        let err = locate("hello", &edit("zzz")).unwrap_err();
        assert_eq!(err.code(), smartctx_error::ErrorCode::EditFailed);
    }
}
