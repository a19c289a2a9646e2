//! Shared error taxonomy and result envelope for the smart-context backend.
//!
//! Library crates return [`Error`]; the intent router is the only place that
//! flattens it into the wire-level `{ ok, data?, error? }` envelope.

mod code;

pub use code::CodeMeta;
pub use code::DegradationReason;
pub use code::ErrorCode;
pub use code::StatusCategory;

use serde::Serialize;

/// A single conflicting/candidate line number attached to `AmbiguousMatch`.
pub type LineNo = u32;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Coded(#[source] Box<CodedError>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("(de)serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
#[error("{code:?}: {message}")]
pub struct CodedError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub suggestion: Option<String>,
}

impl Error {
    pub fn coded(code: ErrorCode, message: impl Into<String>) -> Self {
        Error::Coded(Box::new(CodedError {
            code,
            message: message.into(),
            details: None,
            suggestion: None,
        }))
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        if let Error::Coded(e) = &mut self {
            e.details = Some(details);
        }
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        if let Error::Coded(e) = &mut self {
            e.suggestion = Some(suggestion.into());
        }
        self
    }

    /// Classification used only for logging/retry decisions, never serialized.
    pub fn meta(&self) -> CodeMeta {
        match self {
            Error::Coded(e) => e.code.meta(),
            Error::Io(_) => ErrorCode::InternalError.meta(),
            Error::Store(_) => ErrorCode::InternalError.meta(),
            Error::Json(_) => ErrorCode::InternalError.meta(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Coded(e) => e.code,
            _ => ErrorCode::InternalError,
        }
    }

    /// The wire-level error object serialized into `{ error }` on the envelope.
    pub fn to_wire(&self) -> WireError {
        match self {
            Error::Coded(e) => WireError {
                code: e.code.wire_name().to_string(),
                message: e.message.clone(),
                details: e.details.clone(),
                suggestion: e.suggestion.clone(),
            },
            other => WireError {
                code: ErrorCode::InternalError.wire_name().to_string(),
                message: other.to_string(),
                details: None,
                suggestion: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WireError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

pub type Result<T> = std::result::Result<T, Error>;

/// A soft degradation attached to a search response without failing the call.
#[derive(Debug, Clone, Serialize)]
pub struct Degradation {
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Degradation {
    pub fn new(reason: DegradationReason) -> Self {
        Self {
            reason: reason.wire_name().to_string(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
