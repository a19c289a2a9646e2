//! Edit descriptor types (§4.8): the wire shape a caller sends per file edit.

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditOperation {
    Create,
    Delete,
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuzzyMode {
    Whitespace,
    Levenshtein,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertMode {
    Before,
    After,
    At,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SafetyLevel {
    #[default]
    Normal,
    Force,
}

/// A 1-based, inclusive line window used to restrict a search or describe
/// an insertion point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineWindow {
    pub start_line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditDescriptor {
    pub file: String,
    pub operation: EditOperation,
    #[serde(default)]
    pub target_string: Option<String>,
    #[serde(default)]
    pub replacement_string: Option<String>,
    #[serde(default)]
    pub line_range: Option<LineWindow>,
    #[serde(default)]
    pub before_context: Option<String>,
    #[serde(default)]
    pub after_context: Option<String>,
    #[serde(default)]
    pub fuzzy_mode: Option<FuzzyMode>,
    #[serde(default)]
    pub anchor_search_range: Option<LineWindow>,
    #[serde(default)]
    pub expected_hash: Option<String>,
    #[serde(default)]
    pub insert_mode: Option<InsertMode>,
    #[serde(default)]
    pub insert_line_range: Option<LineWindow>,
    #[serde(default)]
    pub confirmation_hash: Option<String>,
    #[serde(default)]
    pub safety_level: SafetyLevel,
}

/// A located span in a file, in both byte and 1-based line coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_line: u32,
    pub end_line: u32,
}
