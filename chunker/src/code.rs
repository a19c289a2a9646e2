//! Code chunker: one chunk per top-level symbol, plus a file-header chunk
//! (§4.2). Full AST parsing is explicitly out of scope (§1) — that's the
//! job of a pluggable parser backend. [`SymbolSource`] is the seam: the
//! default [`HeuristicSymbolSource`] is a conservative line-scanning stand-in
//! good enough to exercise the rest of the pipeline; a real deployment
//! plugs in a tree-sitter-backed implementation behind the same trait.

use once_cell::sync::Lazy;
use regex::Regex;
use smartctx_store::Chunk;
use smartctx_store::ChunkKind;
use smartctx_store::LineRange;
use smartctx_store::Symbol;
use smartctx_store::SymbolKind;

use crate::hash::sha256_hex_str;

#[derive(Debug, Clone)]
pub struct RawSymbol {
    pub name: String,
    pub kind: SymbolKind,
    /// 1-based line the symbol's definition starts on.
    pub start_line: u32,
    pub signature: Option<String>,
}

/// Capability boundary for extracting a canonical symbol/range structure
/// from source text (§1 "pluggable parser backend").
pub trait SymbolSource: Send + Sync {
    fn extract(&self, language: &str, text: &str) -> Vec<RawSymbol>;
}

struct Pattern {
    re: Regex,
    kind: SymbolKind,
}

static RUST_PATTERNS: Lazy<Vec<Pattern>> = Lazy::new(|| {
    vec![
        Pattern {
            re: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?fn\s+(\w+)").unwrap(),
            kind: SymbolKind::Function,
        },
        Pattern {
            re: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?struct\s+(\w+)").unwrap(),
            kind: SymbolKind::Class,
        },
        Pattern {
            re: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?enum\s+(\w+)").unwrap(),
            kind: SymbolKind::Type,
        },
        Pattern {
            re: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?trait\s+(\w+)").unwrap(),
            kind: SymbolKind::Interface,
        },
        Pattern {
            re: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?const\s+(\w+)").unwrap(),
            kind: SymbolKind::Constant,
        },
    ]
});

static PY_PATTERNS: Lazy<Vec<Pattern>> = Lazy::new(|| {
    vec![
        Pattern {
            re: Regex::new(r"^(?:async\s+)?def\s+(\w+)").unwrap(),
            kind: SymbolKind::Function,
        },
        Pattern {
            re: Regex::new(r"^class\s+(\w+)").unwrap(),
            kind: SymbolKind::Class,
        },
    ]
});

static C_FAMILY_PATTERNS: Lazy<Vec<Pattern>> = Lazy::new(|| {
    vec![
        Pattern {
            re: Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s+(\w+)").unwrap(),
            kind: SymbolKind::Function,
        },
        Pattern {
            re: Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?class\s+(\w+)").unwrap(),
            kind: SymbolKind::Class,
        },
        Pattern {
            re: Regex::new(r"^\s*(?:export\s+)?interface\s+(\w+)").unwrap(),
            kind: SymbolKind::Interface,
        },
        Pattern {
            re: Regex::new(r"^\s*(?:export\s+)?(?:const|let)\s+(\w+)\s*=").unwrap(),
            kind: SymbolKind::Variable,
        },
    ]
});

static GO_PATTERNS: Lazy<Vec<Pattern>> = Lazy::new(|| {
    vec![
        Pattern {
            re: Regex::new(r"^func\s+(?:\([^)]*\)\s*)?(\w+)").unwrap(),
            kind: SymbolKind::Function,
        },
        Pattern {
            re: Regex::new(r"^type\s+(\w+)\s+struct").unwrap(),
            kind: SymbolKind::Class,
        },
    ]
});

/// Regex-based stand-in for a real AST parser backend.
pub struct HeuristicSymbolSource;

impl SymbolSource for HeuristicSymbolSource {
    fn extract(&self, language: &str, text: &str) -> Vec<RawSymbol> {
        let patterns: &[Pattern] = match language {
            "rust" => &RUST_PATTERNS,
            "python" => &PY_PATTERNS,
            "javascript" | "typescript" => &C_FAMILY_PATTERNS,
            "go" => &GO_PATTERNS,
            _ => return Vec::new(),
        };

        let mut out = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            for p in patterns {
                if let Some(caps) = p.re.captures(line) {
                    out.push(RawSymbol {
                        name: caps[1].to_string(),
                        kind: p.kind,
                        start_line: (idx + 1) as u32,
                        signature: Some(line.trim().to_string()),
                    });
                    break;
                }
            }
        }
        out
    }
}

pub fn chunk_code(
    path: &str,
    text: &str,
    language: &str,
    source: &dyn SymbolSource,
) -> (Vec<Chunk>, Vec<Symbol>) {
    let lines: Vec<&str> = text.lines().collect();
    let total = lines.len() as u32;
    if total == 0 {
        return (Vec::new(), Vec::new());
    }
    let raw_symbols = source.extract(language, text);

    let mut chunks = Vec::new();
    let mut symbols = Vec::new();

    let first_symbol_line = raw_symbols.first().map(|s| s.start_line).unwrap_or(total + 1);
    if first_symbol_line > 1 {
        let header_end = (first_symbol_line - 1).min(total);
        if header_end >= 1 {
            let range = LineRange::new(1, header_end);
            chunks.push(build_chunk(path, &lines, range, ChunkKind::Code, Vec::new(), None, None));
        }
    }

    for (i, sym) in raw_symbols.iter().enumerate() {
        let end = raw_symbols
            .get(i + 1)
            .map(|next| next.start_line.saturating_sub(1))
            .unwrap_or(total)
            .max(sym.start_line);
        let range = LineRange::new(sym.start_line, end);
        chunks.push(build_chunk(
            path,
            &lines,
            range,
            ChunkKind::Code,
            Vec::new(),
            Some(sym.name.clone()),
            None,
        ));
        symbols.push(Symbol {
            name: sym.name.clone(),
            kind: sym.kind,
            file_path: path.to_string(),
            range,
            signature: sym.signature.clone(),
        });
    }

    if chunks.is_empty() {
        chunks.push(build_chunk(
            path,
            &lines,
            LineRange::new(1, total),
            ChunkKind::Code,
            Vec::new(),
            None,
            None,
        ));
    }

    (chunks, symbols)
}

fn build_chunk(
    path: &str,
    lines: &[&str],
    range: LineRange,
    kind: ChunkKind,
    section_path: Vec<String>,
    heading: Option<String>,
    heading_level: Option<u32>,
) -> Chunk {
    let start = (range.start_line.saturating_sub(1)) as usize;
    let end = (range.end_line as usize).min(lines.len());
    let slice = if start < end { lines[start..end].join("\n") } else { String::new() };
    Chunk {
        id: Chunk::derive_id(path, range),
        path: path.to_string(),
        kind,
        section_path,
        heading,
        heading_level,
        range,
        content_hash: sha256_hex_str(&slice),
        text: slice,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_functions_partition_file() {
        let text = "use std::fmt;\n\nfn a() {\n  1\n}\n\nfn b() {\n  2\n}\n";
        let (chunks, symbols) = chunk_code("lib.rs", text, "rust", &HeuristicSymbolSource);
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "a");
        assert_eq!(symbols[1].name, "b");
        // Header chunk + two symbol chunks, contiguous.
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].range.end_line + 1, chunks[1].range.start_line);
        assert_eq!(chunks[1].range.end_line + 1, chunks[2].range.start_line);
        assert_eq!(chunks.last().unwrap().range.end_line, text.lines().count() as u32);
    }

    #[test]
    fn file_with_no_symbols_is_one_chunk() {
        let text = "const X: u32 = 1;\n";
        let (chunks, symbols) = chunk_code("consts.rs", text, "rust", &HeuristicSymbolSource);
        assert!(symbols.len() <= 1);
        assert!(!chunks.is_empty());
    }
}
