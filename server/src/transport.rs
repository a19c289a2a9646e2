//! Line-delimited JSON stdio transport (§6): reads `{ id, tool, args }`
//! requests one per line from an async reader, dispatches each through the
//! [`IntentRouter`], and writes `{ id, content: [{ type, text }], isError? }`
//! one per line to an async writer.

use serde::Deserialize;
use serde::Serialize;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;

use crate::router::IntentRouter;

#[derive(Debug, Deserialize)]
struct Request {
    id: serde_json::Value,
    tool: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: &'static str,
    text: String,
}

#[derive(Debug, Serialize)]
struct Response {
    id: serde_json::Value,
    content: Vec<ContentBlock>,
    #[serde(rename = "isError", skip_serializing_if = "is_false")]
    is_error: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Runs the request/response loop until the reader hits EOF or `shutdown`
/// resolves. Returns normally on a clean EOF; the caller decides the exit
/// code (§6: 0 clean, 1 forced past the shutdown timeout).
pub async fn serve<R, W>(router: &IntentRouter, mut reader: BufReader<R>, mut writer: W, mut shutdown: tokio::sync::watch::Receiver<bool>) -> std::io::Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let read = tokio::select! {
            biased;
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
                continue;
            }
            result = reader.read_line(&mut line) => result?,
        };
        if read == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = handle_line(router, trimmed).await;
        let serialized = serde_json::to_string(&response).unwrap_or_else(|_| {
            r#"{"id":null,"content":[{"type":"text","text":"{}"}],"isError":true}"#.to_string()
        });
        writer.write_all(serialized.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

async fn handle_line(router: &IntentRouter, line: &str) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            let envelope = crate::envelope::Envelope::err(&smartctx_error::Error::coded(
                smartctx_error::ErrorCode::MissingParameter,
                format!("malformed request: {e}"),
            ));
            let text = serde_json::to_string(&envelope).unwrap_or_else(|_| "{\"ok\":false}".to_string());
            return Response {
                id: serde_json::Value::Null,
                content: vec![ContentBlock { block_type: "text", text }],
                is_error: true,
            };
        }
    };

    let now_ms = chrono::Utc::now().timestamp_millis();
    let envelope = router.dispatch(&request.tool, request.args, now_ms).await;
    let is_error = !envelope.ok;
    let text = serde_json::to_string(&envelope).unwrap_or_else(|_| "{\"ok\":false}".to_string());
    Response {
        id: request.id,
        content: vec![ContentBlock { block_type: "text", text }],
        is_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::App;
    use std::sync::Arc;

    #[tokio::test]
    async fn round_trips_one_request_per_line() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hi\n").unwrap();
        let app = Arc::new(App::bootstrap(dir.path().to_path_buf()).await.unwrap());
        let router = IntentRouter::new(app);

        let input = b"{\"id\":1,\"tool\":\"read_code\",\"args\":{\"file\":\"a.txt\"}}\n".to_vec();
        let reader = BufReader::new(std::io::Cursor::new(input));
        let mut output = Vec::new();
        let (_tx, rx) = tokio::sync::watch::channel(false);

        serve(&router, reader, &mut output, rx).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(text.trim()) .unwrap();
        assert_eq!(parsed["id"], 1);
        assert_eq!(parsed["isError"], false);
    }

    #[tokio::test]
    async fn malformed_line_yields_error_response_without_crashing() {
        let dir = tempfile::tempdir().unwrap();
        let app = Arc::new(App::bootstrap(dir.path().to_path_buf()).await.unwrap());
        let router = IntentRouter::new(app);

        let input = b"not json\n".to_vec();
        let reader = BufReader::new(std::io::Cursor::new(input));
        let mut output = Vec::new();
        let (_tx, rx) = tokio::sync::watch::channel(false);

        serve(&router, reader, &mut output, rx).await.unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("\"isError\":true"));
        let parsed: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        let inner: serde_json::Value = serde_json::from_str(parsed["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(inner["error"]["code"], "MissingParameter");
    }
}
