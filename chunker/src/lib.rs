//! Chunker & Outline Extractor (C2, §4.2): splits documents into headed
//! sections and extracts symbol outlines from code, plus the deterministic
//! preview builder shared by the search pipeline's evidence shaping stage.

mod code;
mod dispatch;
mod hash;
mod lang;
mod markdown;
mod outline;
mod preview;
mod text;

pub use code::HeuristicSymbolSource;
pub use code::RawSymbol;
pub use code::SymbolSource;
pub use dispatch::ChunkingOptions;
pub use dispatch::chunk_file;
pub use dispatch::chunk_file_with_source;
pub use hash::sha256_hex;
pub use hash::sha256_hex_str;
pub use lang::classify_kind;
pub use lang::detect_language;
pub use outline::OutlineEntry;
pub use outline::outline_from_markdown_chunks;
pub use outline::outline_from_symbols;
pub use preview::PREVIEW_LINE_CAP;
pub use preview::SUMMARY_LINE_CAP;
pub use preview::build_preview;
