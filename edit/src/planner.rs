//! Edit Planner (§4.8): turns a resolved [`EditDescriptor`] into the new
//! full contents of a single file (or a deletion), given the file's current
//! bytes. Pure and I/O-free — callers own reading/writing/hashing.

use smartctx_error::Error;
use smartctx_error::ErrorCode;
use smartctx_error::Result;

use crate::matcher::locate;
use crate::types::EditDescriptor;
use crate::types::EditOperation;
use crate::types::InsertMode;
use crate::types::LineWindow;
use crate::types::SafetyLevel;

/// What a single edit resolves to, once located against a file's current text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilePatchKind {
    /// Create a new file with the given contents; fails if one exists.
    Create { contents: String },
    /// Delete the file entirely.
    Delete,
    /// Replace the file's entire contents with `new_contents`.
    Replace { new_contents: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    pub file: String,
    pub kind: FilePatchKind,
}

fn insert_at_line(text: &str, line_range: LineWindow, mode: InsertMode, insertion: &str) -> String {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let before_idx = match mode {
        InsertMode::Before => line_range.start_line.saturating_sub(1) as usize,
        InsertMode::After => line_range.end_line as usize,
        InsertMode::At => line_range.start_line.saturating_sub(1) as usize,
    };
    let before_idx = before_idx.min(lines.len());

    let mut insertion_block = insertion.to_string();
    if !insertion_block.ends_with('\n') {
        insertion_block.push('\n');
    }

    let mut out = String::with_capacity(text.len() + insertion_block.len());
    out.push_str(&lines[..before_idx].concat());
    out.push_str(&insertion_block);
    out.push_str(&lines[before_idx..].concat());
    out
}

/// Builds the new full contents for one file edit (§4.8). Does not apply
/// `expected_hash`/`confirmation_hash` checks against disk state — callers
/// (the transaction coordinator) check those against the live file hash
/// before calling, since this function only sees the bytes it is given.
pub fn plan_one(current_text: Option<&str>, edit: &EditDescriptor) -> Result<FilePatch> {
    plan_one_with_safety(current_text, edit, 10_000, 100)
}

/// Same as [`plan_one`] but with the delete-safety thresholds supplied by
/// the caller, so a project's configured `EditSafetyConfig` is honored
/// rather than the hardcoded defaults.
pub fn plan_one_with_safety(
    current_text: Option<&str>,
    edit: &EditDescriptor,
    large_delete_bytes: u64,
    large_delete_lines: usize,
) -> Result<FilePatch> {
    match edit.operation {
        EditOperation::Create => {
            if current_text.is_some() {
                return Err(Error::coded(
                    ErrorCode::EditFailed,
                    format!("cannot create {}: file already exists", edit.file),
                ));
            }
            let contents = edit.replacement_string.clone().unwrap_or_default();
            Ok(FilePatch {
                file: edit.file.clone(),
                kind: FilePatchKind::Create { contents },
            })
        }
        EditOperation::Delete => {
            let Some(text) = current_text else {
                return Err(Error::coded(ErrorCode::FileNotFound, format!("cannot delete {}: not found", edit.file)));
            };
            check_delete_safety_with(&edit.file, text, edit, large_delete_bytes, large_delete_lines)?;
            Ok(FilePatch {
                file: edit.file.clone(),
                kind: FilePatchKind::Delete,
            })
        }
        EditOperation::Replace => {
            let Some(text) = current_text else {
                return Err(Error::coded(ErrorCode::FileNotFound, format!("cannot edit {}: not found", edit.file)));
            };
            let replacement = edit.replacement_string.as_deref().unwrap_or("");

            if edit.target_string.is_none() {
                // No anchor: this is a pure insertion at a line position.
                let Some(window) = edit.insert_line_range.or(edit.line_range) else {
                    return Err(Error::coded(
                        ErrorCode::EditFailed,
                        format!("replace edit on {} needs target_string or insert_line_range", edit.file),
                    ));
                };
                let mode = edit.insert_mode.unwrap_or(InsertMode::After);
                let new_contents = insert_at_line(text, window, mode, replacement);
                return Ok(FilePatch {
                    file: edit.file.clone(),
                    kind: FilePatchKind::Replace { new_contents },
                });
            }

            let range = locate(text, edit)?;
            let mut new_contents = String::with_capacity(text.len() + replacement.len());
            new_contents.push_str(&text[..range.start_byte]);
            new_contents.push_str(replacement);
            new_contents.push_str(&text[range.end_byte..]);
            Ok(FilePatch {
                file: edit.file.clone(),
                kind: FilePatchKind::Replace { new_contents },
            })
        }
    }
}

/// Deletion of files exceeding the byte/line thresholds requires a matching
/// `confirmation_hash` unless `safety_level = force` (§4.8). `force` only
/// lifts the size/line-count gate — a present-but-mismatched
/// `confirmation_hash` still fails even under `force` (§9 open question).
pub fn check_delete_safety_with(
    file: &str,
    text: &str,
    edit: &EditDescriptor,
    large_delete_bytes: u64,
    large_delete_lines: usize,
) -> Result<()> {
    let is_large = text.len() as u64 > large_delete_bytes || text.lines().count() > large_delete_lines;

    if let Some(expected) = &edit.confirmation_hash {
        let actual = smartctx_chunker::sha256_hex(text.as_bytes());
        if &actual != expected {
            return Err(Error::coded(
                ErrorCode::HashMismatch,
                format!("confirmation_hash mismatch deleting {file}"),
            ));
        }
        return Ok(());
    }

    if is_large && edit.safety_level != SafetyLevel::Force {
        return Err(Error::coded(
            ErrorCode::HashMismatch,
            format!("deleting {file} requires confirmation_hash: exceeds safety thresholds"),
        )
        .with_suggestion("pass confirmation_hash equal to the file's current content hash, or safety_level=force"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FuzzyMode;

    fn base_edit(file: &str, op: EditOperation) -> EditDescriptor {
        EditDescriptor {
            file: file.to_string(),
            operation: op,
            target_string: None,
            replacement_string: None,
            line_range: None,
            before_context: None,
            after_context: None,
            fuzzy_mode: None,
            anchor_search_range: None,
            expected_hash: None,
            insert_mode: None,
            insert_line_range: None,
            confirmation_hash: None,
            safety_level: Default::default(),
        }
    }

    #[test]
    fn create_on_existing_file_fails() {
        let mut e = base_edit("a.txt", EditOperation::Create);
        e.replacement_string = Some("hi".into());
        let err = plan_one(Some("already here"), &e).unwrap_err();
        assert_eq!(err.code(), smartctx_error::ErrorCode::EditFailed);
    }

    #[test]
    fn create_on_new_file_succeeds() {
        let mut e = base_edit("a.txt", EditOperation::Create);
        e.replacement_string = Some("hi\n".into());
        let patch = plan_one(None, &e).unwrap();
        assert_eq!(patch.kind, FilePatchKind::Create { contents: "hi\n".into() });
    }

    #[test]
    fn replace_target_string_single_match() {
        let mut e = base_edit("a.txt", EditOperation::Replace);
        e.target_string = Some("hello".into());
        e.replacement_string = Some("HELLO".into());
        let patch = plan_one(Some("hello world"), &e).unwrap();
        assert_eq!(patch.kind, FilePatchKind::Replace { new_contents: "HELLO world".into() });
    }

    #[test]
    fn ambiguous_replace_propagates_error() {
        let mut e = base_edit("a.txt", EditOperation::Replace);
        e.target_string = Some("x=1".into());
        e.replacement_string = Some("x=2".into());
        let err = plan_one(Some("x=1\nx=1\n"), &e).unwrap_err();
        assert_eq!(err.code(), smartctx_error::ErrorCode::AmbiguousMatch);
    }

    #[test]
    fn levenshtein_replace_applies_closest_match() {
        let mut e = base_edit("a.txt", EditOperation::Replace);
        e.target_string = Some("const value = compute() ;".into());
        e.replacement_string = Some("const value = computeFast();".into());
        e.fuzzy_mode = Some(FuzzyMode::Levenshtein);
        let patch = plan_one(Some("const value = compute();\n"), &e).unwrap();
        assert_eq!(
            patch.kind,
            FilePatchKind::Replace { new_contents: "const value = computeFast();\n".into() }
        );
    }

    #[test]
    fn insert_after_line_range_without_target() {
        let mut e = base_edit("a.txt", EditOperation::Replace);
        e.insert_line_range = Some(LineWindow { start_line: 1, end_line: 1 });
        e.insert_mode = Some(InsertMode::After);
        e.replacement_string = Some("inserted".into());
        let patch = plan_one(Some("line1\nline2\n"), &e).unwrap();
        assert_eq!(patch.kind, FilePatchKind::Replace { new_contents: "line1\ninserted\nline2\n".into() });
    }

    #[test]
    fn delete_small_file_requires_no_confirmation() {
        let e = base_edit("a.txt", EditOperation::Delete);
        let patch = plan_one(Some("small"), &e).unwrap();
        assert_eq!(patch.kind, FilePatchKind::Delete);
    }

    #[test]
    fn delete_large_file_without_confirmation_fails() {
        let e = base_edit("a.txt", EditOperation::Delete);
        let big = "x\n".repeat(200);
        let err = plan_one(Some(&big), &e).unwrap_err();
        assert_eq!(err.code(), smartctx_error::ErrorCode::HashMismatch);
    }

    #[test]
    fn delete_large_file_with_force_succeeds() {
        let mut e = base_edit("a.txt", EditOperation::Delete);
        e.safety_level = SafetyLevel::Force;
        let big = "x\n".repeat(200);
        let patch = plan_one(Some(&big), &e).unwrap();
        assert_eq!(patch.kind, FilePatchKind::Delete);
    }

    #[test]
    fn delete_large_file_with_matching_confirmation_hash_succeeds() {
        let big = "x\n".repeat(200);
        let mut e = base_edit("a.txt", EditOperation::Delete);
        e.confirmation_hash = Some(smartctx_chunker::sha256_hex(big.as_bytes()));
        let patch = plan_one(Some(&big), &e).unwrap();
        assert_eq!(patch.kind, FilePatchKind::Delete);
    }

    #[test]
    fn delete_large_file_with_mismatched_confirmation_hash_fails_even_with_force() {
        let big = "x\n".repeat(200);
        let mut e = base_edit("a.txt", EditOperation::Delete);
        e.confirmation_hash = Some("deadbeef".into());
        e.safety_level = SafetyLevel::Force;
        let err = plan_one(Some(&big), &e).unwrap_err();
        assert_eq!(err.code(), smartctx_error::ErrorCode::HashMismatch);
    }
}
