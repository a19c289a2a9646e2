//! File-extension based language/kind detection.

use std::path::Path;

use smartctx_store::ChunkKind;

pub fn detect_language(path: &str) -> Option<String> {
    let ext = Path::new(path).extension()?.to_str()?;
    let lang = match ext {
        "rs" => "rust",
        "go" => "go",
        "py" => "python",
        "java" => "java",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "md" | "markdown" => "markdown",
        "mdx" => "mdx",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        _ => return None,
    };
    Some(lang.to_string())
}

/// Top-level routing for §9 "polymorphism over chunk kind": which family of
/// chunker a file's content belongs to.
pub fn classify_kind(path: &str, language: Option<&str>) -> ChunkKind {
    match language {
        Some("markdown") => ChunkKind::Markdown,
        Some("mdx") => ChunkKind::Mdx,
        Some(lang) if is_code_language(lang) => ChunkKind::Code,
        _ => {
            if path.ends_with(".md") {
                ChunkKind::Markdown
            } else if path.ends_with(".mdx") {
                ChunkKind::Mdx
            } else {
                ChunkKind::Text
            }
        }
    }
}

fn is_code_language(lang: &str) -> bool {
    matches!(
        lang,
        "rust" | "go" | "python" | "java" | "typescript" | "javascript" | "c" | "cpp" | "csharp" | "ruby" | "php"
    )
}
