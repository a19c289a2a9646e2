//! `read_code` (§4.11): returns a file's content or an outline, capped and
//! truncation-flagged per the configured byte budget.

use serde::Deserialize;
use serde::Serialize;
use smartctx_chunker::outline_from_markdown_chunks;
use smartctx_chunker::outline_from_symbols;
use smartctx_chunker::OutlineEntry;
use smartctx_error::Error;
use smartctx_error::ErrorCode;
use smartctx_error::Result;
use smartctx_indexer::resolve_project_path;
use smartctx_store::ChunkKind;
use smartctx_store::LineRange;

use crate::app::App;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadView {
    Full,
    Skeleton,
    Fragment,
}

#[derive(Debug, Deserialize)]
pub struct ReadCodeArgs {
    pub file: String,
    #[serde(default = "default_view")]
    pub view: ReadView,
    #[serde(default)]
    pub line_range: Option<LineRange>,
}

fn default_view() -> ReadView {
    ReadView::Full
}

#[derive(Debug, Serialize)]
pub struct ReadCodeData {
    pub path: String,
    pub view: ReadView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outline: Option<Vec<OutlineEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<LineRange>,
}

impl Serialize for ReadView {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(match self {
            ReadView::Full => "full",
            ReadView::Skeleton => "skeleton",
            ReadView::Fragment => "fragment",
        })
    }
}

pub async fn read_code(app: &App, args: ReadCodeArgs) -> Result<ReadCodeData> {
    if args.file.trim().is_empty() {
        return Err(Error::coded(ErrorCode::MissingParameter, "read_code requires `file`"));
    }
    let abs = resolve_project_path(&app.project_root, &args.file)
        .ok_or_else(|| Error::coded(ErrorCode::SecurityViolation, format!("{} escapes project root", args.file)))?;

    app.indexer.ensure_fresh(&args.file).await.ok();

    let bytes = tokio::fs::read(&abs)
        .await
        .map_err(|_| Error::coded(ErrorCode::FileNotFound, format!("{} not found", args.file)))?;
    let text = std::str::from_utf8(&bytes)
        .map_err(|_| Error::coded(ErrorCode::InternalError, format!("{} is not valid UTF-8", args.file)))?;

    match args.view {
        ReadView::Full => {
            let max_bytes = app.config.server.read_file_max_bytes as usize;
            let truncated = bytes.len() > max_bytes;
            let content = if truncated {
                // Truncate on a char boundary so the returned prefix stays valid UTF-8.
                let mut end = max_bytes.min(text.len());
                while end > 0 && !text.is_char_boundary(end) {
                    end -= 1;
                }
                text[..end].to_string()
            } else {
                text.to_string()
            };
            Ok(ReadCodeData {
                path: args.file,
                view: ReadView::Full,
                line_count: Some(text.lines().count() as u32),
                content: Some(content),
                truncated: Some(truncated),
                outline: None,
                range: None,
            })
        }
        ReadView::Skeleton => {
            let symbols = app.store.symbols_for_path(&args.file).await?;
            let outline = if !symbols.is_empty() {
                outline_from_symbols(&symbols)
            } else {
                let chunks = app.store.get_chunks_for_path(&args.file).await?;
                if chunks.iter().any(|c| matches!(c.kind, ChunkKind::Markdown | ChunkKind::Mdx)) {
                    outline_from_markdown_chunks(&chunks)
                } else {
                    Vec::new()
                }
            };
            Ok(ReadCodeData {
                path: args.file,
                view: ReadView::Skeleton,
                content: None,
                truncated: None,
                line_count: None,
                outline: Some(outline),
                range: None,
            })
        }
        ReadView::Fragment => {
            let range = args
                .line_range
                .ok_or_else(|| Error::coded(ErrorCode::MissingParameter, "fragment view requires line_range"))?;
            let lines: Vec<&str> = text.lines().collect();
            let start = range.start_line.saturating_sub(1) as usize;
            let end = (range.end_line as usize).min(lines.len());
            let content = if start < end { lines[start..end].join("\n") } else { String::new() };
            Ok(ReadCodeData {
                path: args.file,
                view: ReadView::Fragment,
                content: Some(content),
                truncated: None,
                line_count: None,
                outline: None,
                range: Some(range),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn harness() -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let app = App::bootstrap(dir.path().to_path_buf()).await.unwrap();
        (dir, app)
    }

    #[tokio::test]
    async fn full_view_returns_content() {
        let (dir, app) = harness().await;
        std::fs::write(dir.path().join("a.txt"), "hello\nworld\n").unwrap();
        let data = read_code(&app, ReadCodeArgs { file: "a.txt".into(), view: ReadView::Full, line_range: None })
            .await
            .unwrap();
        assert_eq!(data.content.as_deref(), Some("hello\nworld\n"));
        assert_eq!(data.truncated, Some(false));
    }

    #[tokio::test]
    async fn fragment_view_slices_lines() {
        let (dir, app) = harness().await;
        std::fs::write(dir.path().join("a.txt"), "l1\nl2\nl3\nl4\n").unwrap();
        let data = read_code(
            &app,
            ReadCodeArgs {
                file: "a.txt".into(),
                view: ReadView::Fragment,
                line_range: Some(LineRange::new(2, 3)),
            },
        )
        .await
        .unwrap();
        assert_eq!(data.content.as_deref(), Some("l2\nl3"));
    }

    #[tokio::test]
    async fn escaping_project_root_is_rejected() {
        let (_dir, app) = harness().await;
        let err = read_code(&app, ReadCodeArgs { file: "../etc/passwd".into(), view: ReadView::Full, line_range: None })
            .await
            .unwrap_err();
        assert_eq!(err.code(), smartctx_error::ErrorCode::SecurityViolation);
    }

    #[tokio::test]
    async fn missing_file_is_file_not_found() {
        let (_dir, app) = harness().await;
        let err = read_code(&app, ReadCodeArgs { file: "nope.txt".into(), view: ReadView::Full, line_range: None })
            .await
            .unwrap_err();
        assert_eq!(err.code(), smartctx_error::ErrorCode::FileNotFound);
    }
}
