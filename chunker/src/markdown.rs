//! ATX-heading chunker for markdown and MDX documents (§4.2).
//!
//! Every heading line — at any level — opens a new chunk boundary; a
//! chunk's span runs to the line before the next heading of any level, so
//! the resulting chunks tile the file with no gaps or overlap. `section_path`
//! is the stack of ancestor heading titles, shallowest first, including the
//! chunk's own heading.

use once_cell::sync::Lazy;
use regex::Regex;
use smartctx_store::Chunk;
use smartctx_store::ChunkKind;
use smartctx_store::LineRange;

use crate::hash::sha256_hex_str;

static ATX_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+?)\s*#*\s*$").unwrap());

struct HeadingLine {
    line_no: u32,
    level: u32,
    title: String,
}

fn find_headings(text: &str) -> Vec<HeadingLine> {
    let mut in_fence = false;
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some(caps) = ATX_HEADING.captures(line) {
            let level = caps[1].len() as u32;
            let title = caps[2].trim().to_string();
            out.push(HeadingLine {
                line_no: (idx + 1) as u32,
                level,
                title,
            });
        }
    }
    out
}

pub fn chunk_markdown(path: &str, text: &str, kind: ChunkKind) -> Vec<Chunk> {
    let total_lines = if text.is_empty() { 0 } else { text.lines().count() as u32 };
    if total_lines == 0 {
        return Vec::new();
    }
    let headings = find_headings(text);
    let lines: Vec<&str> = text.lines().collect();

    let mut chunks = Vec::new();
    let mut stack: Vec<(u32, String)> = Vec::new();

    let mut boundaries: Vec<(u32, Option<&HeadingLine>)> = Vec::new();
    if headings.is_empty() || headings[0].line_no > 1 {
        boundaries.push((1, None));
    }
    for h in &headings {
        boundaries.push((h.line_no, Some(h)));
    }

    for (i, (start, heading)) in boundaries.iter().enumerate() {
        let end = boundaries
            .get(i + 1)
            .map(|(next_start, _)| next_start - 1)
            .unwrap_or(total_lines);
        if *start > end {
            continue;
        }
        let range = LineRange::new(*start, end);
        let section_path;
        let heading_title;
        let heading_level;
        if let Some(h) = heading {
            while let Some((lvl, _)) = stack.last() {
                if *lvl >= h.level {
                    stack.pop();
                } else {
                    break;
                }
            }
            stack.push((h.level, h.title.clone()));
            section_path = stack.iter().map(|(_, t)| t.clone()).collect();
            heading_title = Some(h.title.clone());
            heading_level = Some(h.level);
        } else {
            section_path = Vec::new();
            heading_title = None;
            heading_level = None;
        }

        let slice = slice_lines(&lines, range);
        let id = Chunk::derive_id(path, range);
        chunks.push(Chunk {
            id,
            path: path.to_string(),
            kind,
            section_path,
            heading: heading_title,
            heading_level,
            range,
            content_hash: sha256_hex_str(&slice),
            text: slice,
        });
    }
    chunks
}

fn slice_lines(lines: &[&str], range: LineRange) -> String {
    let start = (range.start_line.saturating_sub(1)) as usize;
    let end = (range.end_line as usize).min(lines.len());
    if start >= end {
        return String::new();
    }
    lines[start..end].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_headings_produce_disjoint_partition() {
        let text = "# A\nintro\n## B\nbody of b\n";
        let chunks = chunk_markdown("docs/intro.md", text, ChunkKind::Markdown);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section_path, vec!["A".to_string()]);
        assert_eq!(chunks[1].section_path, vec!["A".to_string(), "B".to_string()]);
        // Partition: contiguous, no gaps, no overlap.
        assert_eq!(chunks[0].range.end_line + 1, chunks[1].range.start_line);
        assert_eq!(chunks[1].range.end_line, 4);
    }

    #[test]
    fn leading_text_before_first_heading_is_its_own_chunk() {
        let text = "preamble\n# Title\nbody\n";
        let chunks = chunk_markdown("a.md", text, ChunkKind::Markdown);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].heading.is_none());
        assert!(chunks[0].section_path.is_empty());
    }

    #[test]
    fn headings_inside_fenced_code_blocks_are_ignored() {
        let text = "# Real\n```\n# not a heading\n```\nmore\n";
        let chunks = chunk_markdown("a.md", text, ChunkKind::Markdown);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].range, LineRange::new(1, 5));
    }
}
