//! Error and degradation code classification.
//!
//! Every hard failure surfaced to a caller carries one [`ErrorCode`]; every
//! soft failure absorbed by ranking/indexing carries one [`DegradationReason`].
//! Both attach a [`CodeMeta`] used only for internal logging/retry decisions —
//! it never crosses the wire.

use strum::AsRefStr;
use strum::EnumIter;

/// Internal classification bucket for an error or degradation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    Input,
    Security,
    IO,
    Conflict,
    Resource,
    Internal,
}

/// Logging/retry metadata for a code. Never serialized to callers.
#[derive(Debug, Clone, Copy)]
pub struct CodeMeta {
    pub retryable: bool,
    pub log_error: bool,
    pub category: StatusCategory,
}

macro_rules! define_codes {
    ($(#[$enum_attr:meta])* $enum_name:ident { $(
        $(#[$attr:meta])*
        $name:ident => { retryable: $retry:expr, log_error: $log:expr, category: $cat:ident }
    ),* $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumIter)]
        $(#[$enum_attr])*
        pub enum $enum_name {
            $($(#[$attr])* $name,)*
        }

        impl $enum_name {
            pub const fn meta(&self) -> CodeMeta {
                match self {
                    $(Self::$name => CodeMeta {
                        retryable: $retry,
                        log_error: $log,
                        category: StatusCategory::$cat,
                    },)*
                }
            }

            /// The wire-level string, matching `error.code` in the tool envelope.
            pub fn wire_name(&self) -> &'static str {
                self.as_ref()
            }
        }
    };
}

define_codes! {
    ErrorCode {
        /// Required argument absent.
        MissingParameter => { retryable: false, log_error: false, category: Input },
        /// Path escapes the project root (symlink-aware).
        SecurityViolation => { retryable: false, log_error: true, category: Security },
        /// Target file absent.
        FileNotFound => { retryable: false, log_error: false, category: IO },
        /// `expected_hash`/`confirmation_hash` differs from the current file hash.
        HashMismatch => { retryable: false, log_error: false, category: Conflict },
        /// Edit matcher found more than one candidate range.
        AmbiguousMatch => { retryable: false, log_error: false, category: Conflict },
        /// Planner could not locate the edit anchor.
        EditFailed => { retryable: false, log_error: false, category: Conflict },
        /// Relationship target could not be resolved.
        SymbolNotFound => { retryable: false, log_error: false, category: Input },
        /// Unhandled internal error.
        InternalError => { retryable: true, log_error: true, category: Internal },
    }
}

define_codes! {
    #[strum(serialize_all = "snake_case")]
    DegradationReason {
        /// The embedding provider did not respond within `max_time_ms`.
        EmbeddingTimeout => { retryable: true, log_error: false, category: Resource },
        /// Vector ranking is disabled for this request/provider.
        VectorDisabled => { retryable: false, log_error: false, category: Resource },
        /// Some but not all candidate chunks were embedded before the deadline.
        EmbeddingPartial => { retryable: true, log_error: false, category: Resource },
        /// Candidate set exceeded `max_chunk_candidates` and was pruned.
        BudgetExceeded => { retryable: false, log_error: false, category: Resource },
        /// Evidence shaping truncated sections/chars to stay within budget.
        EvidenceTruncated => { retryable: false, log_error: false, category: Resource },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_pascal_case_on_the_wire() {
        assert_eq!(ErrorCode::MissingParameter.wire_name(), "MissingParameter");
        assert_eq!(ErrorCode::HashMismatch.wire_name(), "HashMismatch");
    }

    #[test]
    fn degradation_reasons_are_snake_case_on_the_wire() {
        assert_eq!(DegradationReason::EmbeddingTimeout.wire_name(), "embedding_timeout");
        assert_eq!(DegradationReason::VectorDisabled.wire_name(), "vector_disabled");
        assert_eq!(DegradationReason::EmbeddingPartial.wire_name(), "embedding_partial");
        assert_eq!(DegradationReason::BudgetExceeded.wire_name(), "budget_exceeded");
        assert_eq!(DegradationReason::EvidenceTruncated.wire_name(), "evidence_truncated");
    }
}
