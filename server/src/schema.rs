//! Tool schema advertisement (§6): the six intent tools plus optional
//! legacy aliases, gated by the `SMARTCTX_LEGACY_ALIASES` environment flag
//! so older callers can keep addressing tools under their pre-router names.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: &'static str,
}

const CORE_TOOLS: &[(&str, &str)] = &[
    ("read_code", "Read a file's content, outline, or a line fragment."),
    ("search_project", "Hybrid lexical/vector search, or a symbol/file/directory lookup."),
    ("analyze_relationship", "Dependency, call, type, data-flow, or impact analysis between targets."),
    ("edit_code", "Apply a batch of file edits transactionally, with an impact preview."),
    ("get_batch_guidance", "Cluster related files and flag patterns missing from a minority."),
    ("manage_project", "Undo, redo, status, reindex, and history administration."),
];

/// `tool_name -> legacy_alias`, enabled only when `legacy_aliases` is true.
const LEGACY_ALIASES: &[(&str, &str)] = &[
    ("read_code", "get_file_content"),
    ("search_project", "search_code"),
    ("analyze_relationship", "get_dependencies"),
    ("edit_code", "apply_edits"),
    ("get_batch_guidance", "batch_guidance"),
    ("manage_project", "project_admin"),
];

/// Reads `SMARTCTX_LEGACY_ALIASES` ("1"/"true" enables; anything else,
/// including unset, disables) per the §6 "gated by environment flag" line.
pub fn legacy_aliases_enabled() -> bool {
    std::env::var("SMARTCTX_LEGACY_ALIASES")
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"))
        .unwrap_or(false)
}

/// Maps a legacy alias back to its canonical tool name, for routers that
/// accept `name` regardless of which schema advertised it.
pub fn canonicalize(name: &str) -> Option<&'static str> {
    LEGACY_ALIASES.iter().find(|(_, alias)| *alias == name).map(|(canonical, _)| *canonical)
}

pub fn advertised_tools(legacy_aliases: bool) -> Vec<ToolSchema> {
    let mut tools: Vec<ToolSchema> = CORE_TOOLS
        .iter()
        .map(|(name, description)| ToolSchema { name: name.to_string(), description })
        .collect();

    if legacy_aliases {
        for (canonical, alias) in LEGACY_ALIASES {
            if let Some((_, description)) = CORE_TOOLS.iter().find(|(name, _)| name == canonical) {
                tools.push(ToolSchema { name: alias.to_string(), description });
            }
        }
    }

    tools
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_schema_lists_exactly_the_six_intents() {
        let tools = advertised_tools(false);
        assert_eq!(tools.len(), 6);
        assert_eq!(tools[0].name, "read_code");
    }

    #[test]
    fn legacy_aliases_double_the_listing_when_enabled() {
        let tools = advertised_tools(true);
        assert_eq!(tools.len(), 12);
    }
}
