//! Outline extraction for `read_code(view: skeleton)` (§4.11).

use serde::Serialize;
use smartctx_store::Chunk;
use smartctx_store::Symbol;

#[derive(Debug, Clone, Serialize)]
pub struct OutlineEntry {
    pub name: String,
    pub kind: String,
    pub start_line: u32,
    pub end_line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

pub fn outline_from_symbols(symbols: &[Symbol]) -> Vec<OutlineEntry> {
    let mut entries: Vec<OutlineEntry> = symbols
        .iter()
        .map(|s| OutlineEntry {
            name: s.name.clone(),
            kind: s.kind.as_str().to_string(),
            start_line: s.range.start_line,
            end_line: s.range.end_line,
            signature: s.signature.clone(),
        })
        .collect();
    entries.sort_by_key(|e| e.start_line);
    entries
}

pub fn outline_from_markdown_chunks(chunks: &[Chunk]) -> Vec<OutlineEntry> {
    chunks
        .iter()
        .filter_map(|c| {
            let heading = c.heading.as_ref()?;
            Some(OutlineEntry {
                name: heading.clone(),
                kind: format!("h{}", c.heading_level.unwrap_or(1)),
                start_line: c.range.start_line,
                end_line: c.range.end_line,
                signature: None,
            })
        })
        .collect()
}
