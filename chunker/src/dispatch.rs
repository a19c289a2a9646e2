//! Single entry point dispatching on `Chunk.kind` (§9 "polymorphism over
//! chunk kind" — a tagged variant with a small dispatch table, no runtime
//! inheritance).

use smartctx_store::Chunk;
use smartctx_store::ChunkKind;
use smartctx_store::Symbol;

use crate::code::HeuristicSymbolSource;
use crate::code::SymbolSource;
use crate::code::chunk_code;
use crate::lang::classify_kind;
use crate::markdown::chunk_markdown;
use crate::text::chunk_text;

#[derive(Debug, Clone, Copy)]
pub struct ChunkingOptions {
    pub text_window_lines: usize,
    pub text_window_overlap_lines: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            text_window_lines: 60,
            text_window_overlap_lines: 10,
        }
    }
}

/// Chunk one file's text, dispatching by its detected [`ChunkKind`]. Returns
/// the file's chunks and (for code) the symbols extracted alongside them —
/// grounded in the "symbol-kind-aware chunk extraction" supplement (§10.5):
/// the parser backend returns both chunk boundaries and symbol metadata in
/// one pass, so there is no separate symbol-extraction step.
pub fn chunk_file(
    path: &str,
    text: &str,
    language: Option<&str>,
    opts: ChunkingOptions,
) -> (Vec<Chunk>, Vec<Symbol>) {
    let source = HeuristicSymbolSource;
    chunk_file_with_source(path, text, language, opts, &source)
}

pub fn chunk_file_with_source(
    path: &str,
    text: &str,
    language: Option<&str>,
    opts: ChunkingOptions,
    symbol_source: &dyn SymbolSource,
) -> (Vec<Chunk>, Vec<Symbol>) {
    let kind = classify_kind(path, language);
    match kind {
        ChunkKind::Markdown | ChunkKind::Mdx => (chunk_markdown(path, text, kind), Vec::new()),
        ChunkKind::Code | ChunkKind::CodeComment => {
            chunk_code(path, text, language.unwrap_or(""), symbol_source)
        }
        ChunkKind::Text => (
            chunk_text(path, text, opts.text_window_lines, opts.text_window_overlap_lines),
            Vec::new(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_partition_invariant_markdown() {
        let text = "# A\nbody one\n## B\nbody two\n";
        let (chunks, _) = chunk_file("d.md", text, Some("markdown"), ChunkingOptions::default());
        assert_partition(&chunks, text.lines().count() as u32);
    }

    #[test]
    fn chunk_partition_invariant_code() {
        let text = "fn a() {\n  1\n}\nfn b() {\n  2\n}\n";
        let (chunks, symbols) = chunk_file("m.rs", text, Some("rust"), ChunkingOptions::default());
        assert_partition(&chunks, text.lines().count() as u32);
        assert_eq!(symbols.len(), 2);
    }

    fn assert_partition(chunks: &[smartctx_store::Chunk], total_lines: u32) {
        let mut sorted = chunks.to_vec();
        sorted.sort_by_key(|c| c.range.start_line);
        assert_eq!(sorted.first().unwrap().range.start_line, 1);
        assert_eq!(sorted.last().unwrap().range.end_line, total_lines);
        for w in sorted.windows(2) {
            assert_eq!(w[0].range.end_line + 1, w[1].range.start_line);
        }
    }
}
