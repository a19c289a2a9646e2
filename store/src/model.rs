//! Row-level data model shared by every table in §3 of the spec.

use serde::Deserialize;
use serde::Serialize;

/// A 1-based, inclusive line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start_line: u32,
    pub end_line: u32,
}

impl LineRange {
    pub fn new(start_line: u32, end_line: u32) -> Self {
        Self {
            start_line,
            end_line,
        }
    }

    pub fn len(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end_line < self.start_line
    }

    pub fn overlaps(&self, other: &LineRange) -> bool {
        self.start_line <= other.end_line && other.start_line <= self.end_line
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewlineStyle {
    Lf,
    CrLf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndentStyle {
    Spaces2,
    Spaces4,
    Tabs,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub content_hash: String,
    pub size_bytes: u64,
    pub line_count: u32,
    pub mtime: i64,
    pub language_tag: Option<String>,
    pub newline_style: NewlineStyle,
    pub indent_style: IndentStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Markdown,
    Mdx,
    Code,
    CodeComment,
    Text,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Markdown => "markdown",
            ChunkKind::Mdx => "mdx",
            ChunkKind::Code => "code",
            ChunkKind::CodeComment => "code_comment",
            ChunkKind::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "markdown" => ChunkKind::Markdown,
            "mdx" => ChunkKind::Mdx,
            "code" => ChunkKind::Code,
            "code_comment" => ChunkKind::CodeComment,
            "text" => ChunkKind::Text,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub path: String,
    pub kind: ChunkKind,
    /// Ordered heading titles from root to this section; empty for code.
    pub section_path: Vec<String>,
    pub heading: Option<String>,
    pub heading_level: Option<u32>,
    pub range: LineRange,
    pub text: String,
    pub content_hash: String,
}

impl Chunk {
    /// Deterministic id from `path` + section range (§3).
    pub fn derive_id(path: &str, range: LineRange) -> String {
        format!("{path}#{}-{}", range.start_line, range.end_line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    Type,
    Variable,
    Constant,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Type => "type",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "function" => SymbolKind::Function,
            "method" => SymbolKind::Method,
            "class" => SymbolKind::Class,
            "interface" => SymbolKind::Interface,
            "type" => SymbolKind::Type,
            "variable" => SymbolKind::Variable,
            "constant" => SymbolKind::Constant,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    pub range: LineRange,
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileEdgeKind {
    Import,
    Reexport,
}

impl FileEdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileEdgeKind::Import => "import",
            FileEdgeKind::Reexport => "reexport",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "import" => FileEdgeKind::Import,
            "reexport" => FileEdgeKind::Reexport,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEdge {
    pub from_path: String,
    pub to_path: String,
    pub edge_kind: FileEdgeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolRelation {
    Calls,
    Extends,
    Implements,
    UsesType,
}

impl SymbolRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolRelation::Calls => "calls",
            SymbolRelation::Extends => "extends",
            SymbolRelation::Implements => "implements",
            SymbolRelation::UsesType => "uses_type",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "calls" => SymbolRelation::Calls,
            "extends" => SymbolRelation::Extends,
            "implements" => SymbolRelation::Implements,
            "uses_type" => SymbolRelation::UsesType,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolEdge {
    pub from_symbol: String,
    pub to_symbol: String,
    pub relation: SymbolRelation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub chunk_id: String,
    pub provider: String,
    pub model: String,
    pub dims: u32,
    pub vector: Vec<f32>,
    pub l2_norm: f32,
}

impl Embedding {
    pub fn new(chunk_id: String, provider: String, model: String, vector: Vec<f32>) -> Self {
        let dims = vector.len() as u32;
        let l2_norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        Self {
            chunk_id,
            provider,
            model,
            dims,
            vector,
            l2_norm,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnState {
    Pending,
    Committed,
    RolledBack,
}

impl TxnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnState::Pending => "pending",
            TxnState::Committed => "committed",
            TxnState::RolledBack => "rolled_back",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => TxnState::Pending,
            "committed" => TxnState::Committed,
            "rolled_back" => TxnState::RolledBack,
            _ => return None,
        })
    }
}

/// A single file's bytes as they were before a transaction touched them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub path: String,
    pub original_bytes: Vec<u8>,
    pub original_hash: Option<String>,
}

/// A forward edit descriptor serialized opaquely by the `edit` crate; the
/// store treats it as a JSON blob sufficient to replay the inverse operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InverseEdit {
    pub path: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionLogEntry {
    pub id: String,
    pub started_at: i64,
    pub state: TxnState,
    pub snapshots: Vec<FileSnapshot>,
    pub inverse_edits: Vec<InverseEdit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackRole {
    Result,
    Evidence,
}

impl PackRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackRole::Result => "result",
            PackRole::Evidence => "evidence",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "result" => PackRole::Result,
            "evidence" => PackRole::Evidence,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackItem {
    pub role: PackRole,
    pub rank: u32,
    pub chunk_id: String,
    pub range: LineRange,
    pub section_path: Vec<String>,
    pub preview: String,
    pub scores: serde_json::Value,
    /// Chunk's `content_hash` at pack creation time.
    pub staleness_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidencePack {
    pub pack_id: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub items: Vec<PackItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChunkSummary {
    pub chunk_id: String,
    pub summary: String,
}
