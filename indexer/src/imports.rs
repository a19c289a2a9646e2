//! Heuristic import/reexport extraction and path resolution (§4.4 edges).
//!
//! Real import resolution belongs to the (out of scope, §1) parser backend;
//! this is a conservative regex-based stand-in that only ever produces an
//! edge when the target can be resolved to a file that is actually indexed,
//! so a missed resolution degrades to "no edge" rather than a dangling one.

use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use smartctx_store::FileEdgeKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImport {
    pub target: String,
    pub kind: FileEdgeKind,
}

static RUST_USE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(pub\s+)?use\s+([:\w]+(?:::\{[^}]*\})?)").unwrap());
static RUST_MOD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(pub\s+)?mod\s+(\w+)\s*;").unwrap());
static JS_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*import\b[^'"]*['"]([^'"]+)['"]"#).unwrap());
static JS_EXPORT_FROM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*export\s+(?:\*|\{[^}]*\})\s*from\s*['"]([^'"]+)['"]"#).unwrap());
static JS_REQUIRE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap());
static PY_IMPORT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*import\s+([\w.]+)").unwrap());
static PY_FROM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*from\s+([\w.]+)\s+import\b").unwrap());

/// Scan `text` for import/reexport statements, per §4.4 file edge kinds.
pub fn extract_imports(language: &str, text: &str) -> Vec<RawImport> {
    match language {
        "rust" => extract_rust(text),
        "typescript" | "javascript" => extract_js(text),
        "python" => extract_python(text),
        _ => Vec::new(),
    }
}

fn extract_rust(text: &str) -> Vec<RawImport> {
    let mut out = Vec::new();
    for line in text.lines() {
        if let Some(caps) = RUST_USE.captures(line) {
            let is_pub = caps.get(1).is_some();
            out.push(RawImport {
                target: caps[2].to_string(),
                kind: if is_pub {
                    FileEdgeKind::Reexport
                } else {
                    FileEdgeKind::Import
                },
            });
        } else if let Some(caps) = RUST_MOD.captures(line) {
            out.push(RawImport {
                target: format!("self::{}", &caps[2]),
                kind: FileEdgeKind::Import,
            });
        }
    }
    out
}

fn extract_js(text: &str) -> Vec<RawImport> {
    let mut out = Vec::new();
    for line in text.lines() {
        if let Some(caps) = JS_EXPORT_FROM.captures(line) {
            out.push(RawImport {
                target: caps[1].to_string(),
                kind: FileEdgeKind::Reexport,
            });
        } else if let Some(caps) = JS_IMPORT.captures(line) {
            out.push(RawImport {
                target: caps[1].to_string(),
                kind: FileEdgeKind::Import,
            });
        }
        if let Some(caps) = JS_REQUIRE.captures(line) {
            out.push(RawImport {
                target: caps[1].to_string(),
                kind: FileEdgeKind::Import,
            });
        }
    }
    out
}

fn extract_python(text: &str) -> Vec<RawImport> {
    let mut out = Vec::new();
    for line in text.lines() {
        if let Some(caps) = PY_FROM.captures(line) {
            out.push(RawImport {
                target: caps[1].replace('.', "/"),
                kind: FileEdgeKind::Import,
            });
        } else if let Some(caps) = PY_IMPORT.captures(line) {
            out.push(RawImport {
                target: caps[1].replace('.', "/"),
                kind: FileEdgeKind::Import,
            });
        }
    }
    out
}

/// Resolve a raw import target to a project-relative path, trying the
/// candidates a real resolver would, but only accepting a match that is
/// actually present in `known_files` — an unresolved import is simply
/// dropped rather than producing a dangling edge (§3 edge invariant).
pub fn resolve_import_target(from_path: &str, target: &str, known_files: &HashSet<String>) -> Option<String> {
    let from_dir = Path::new(from_path).parent().unwrap_or_else(|| Path::new(""));

    let candidates: Vec<String> = if target.starts_with('.') {
        js_relative_candidates(from_dir, target)
    } else if target.contains("::") || target.starts_with("self::") || target.starts_with("crate::") {
        rust_module_candidates(from_path, target)
    } else {
        let mut v = js_relative_candidates(from_dir, &format!("./{target}"));
        v.extend(python_candidates(target));
        v
    };

    candidates.into_iter().find(|c| known_files.contains(c))
}

fn normalize(path: &Path) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for comp in path.components() {
        match comp {
            std::path::Component::ParentDir => {
                parts.pop();
            }
            std::path::Component::Normal(s) => parts.push(s.to_str().unwrap_or("")),
            _ => {}
        }
    }
    parts.join("/")
}

fn js_relative_candidates(from_dir: &Path, target: &str) -> Vec<String> {
    let joined = from_dir.join(target);
    let base = normalize(&joined);
    let exts = ["ts", "tsx", "js", "jsx", "mjs", "py"];
    let mut out = Vec::new();
    for ext in exts {
        out.push(format!("{base}.{ext}"));
        out.push(format!("{base}/index.{ext}"));
    }
    out.push(base);
    out
}

fn python_candidates(target: &str) -> Vec<String> {
    vec![format!("{target}.py"), format!("{target}/__init__.py")]
}

/// `crate::a::b` / `self::a::b` resolved relative to the nearest ancestor
/// `src/` directory of `from_path`, the conventional Rust crate-root anchor.
fn rust_module_candidates(from_path: &str, target: &str) -> Vec<String> {
    let stripped = target
        .trim_start_matches("crate::")
        .trim_start_matches("self::")
        .split("::")
        .next()
        .unwrap_or("")
        .to_string();
    if stripped.is_empty() {
        return Vec::new();
    }
    let src_root = find_src_root(from_path);
    let base = format!("{src_root}{stripped}");
    vec![format!("{base}.rs"), format!("{base}/mod.rs")]
}

fn find_src_root(from_path: &str) -> String {
    let mut parts: Vec<&str> = from_path.split('/').collect();
    parts.pop();
    while let Some(last) = parts.last() {
        if *last == "src" {
            return format!("{}/", parts.join("/"));
        }
        parts.pop();
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_rust_use_and_pub_use() {
        let text = "use crate::foo::Bar;\npub use crate::baz::Qux;\nmod inner;\n";
        let imports = extract_rust(text);
        assert_eq!(imports.len(), 3);
        assert_eq!(imports[0].kind, FileEdgeKind::Import);
        assert_eq!(imports[1].kind, FileEdgeKind::Reexport);
    }

    #[test]
    fn resolves_js_relative_import() {
        let mut known = HashSet::new();
        known.insert("src/utils/helpers.ts".to_string());
        let resolved = resolve_import_target("src/app/main.ts", "../utils/helpers", &known);
        assert_eq!(resolved, Some("src/utils/helpers.ts".to_string()));
    }

    #[test]
    fn unresolvable_import_yields_none() {
        let known = HashSet::new();
        assert!(resolve_import_target("src/app/main.ts", "../utils/helpers", &known).is_none());
    }
}
