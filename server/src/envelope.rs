//! The uniform tool response envelope (§4.11): `{ ok, data?, error? }`.

use serde::Serialize;
use smartctx_error::Error;
use smartctx_error::WireError;

#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

impl Envelope {
    pub fn ok(data: impl Serialize) -> Self {
        Self {
            ok: true,
            data: serde_json::to_value(data).ok(),
            error: None,
        }
    }

    pub fn err(error: &Error) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.to_wire()),
        }
    }

    pub fn from_result<T: Serialize>(result: smartctx_error::Result<T>) -> Self {
        match result {
            Ok(v) => Envelope::ok(v),
            Err(e) => {
                let meta = e.meta();
                if meta.log_error {
                    tracing::error!(code = ?e.code(), error = %e, "tool call failed");
                } else {
                    tracing::warn!(code = ?e.code(), error = %e, "tool call failed");
                }
                Envelope::err(&e)
            }
        }
    }
}
