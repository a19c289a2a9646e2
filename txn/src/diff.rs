//! Unified diffs for `edit_code` previews (§4.8/§4.9 `diff_mode`).

use similar::ChangeTag;
use similar::TextDiff;

/// A compact unified diff between two whole-file texts, in the `similar`
/// crate's standard format. Binary/non-UTF-8 inputs are never routed here —
/// callers reject those earlier with `EditFailed`.
pub fn unified_diff(old: &str, new: &str, path: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(path, path)
        .to_string()
}

/// A terse one-line summary (`+N -M`) used when `diff_mode` is omitted.
pub fn diff_stat(old: &str, new: &str) -> (usize, usize) {
    let diff = TextDiff::from_lines(old, new);
    let mut added = 0usize;
    let mut removed = 0usize;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => removed += 1,
            ChangeTag::Equal => {}
        }
    }
    (added, removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_stat_counts_changed_lines() {
        let (added, removed) = diff_stat("a\nb\nc\n", "a\nx\nc\n");
        assert_eq!((added, removed), (1, 1));
    }

    #[test]
    fn unified_diff_contains_path_header() {
        let out = unified_diff("a\n", "b\n", "foo.txt");
        assert!(out.contains("foo.txt"));
    }
}
