//! Error types for lead intake and tabular store operations.
//!
//! Two layers: `StoreError` covers failures of the external table backend,
//! `LeadsheetError` is the intake taxonomy with stable codes that the HTTP
//! boundary turns into responses. Nothing here is retried locally.

use thiserror::Error;

/// Result type alias using `LeadsheetError`.
pub type Result<T> = std::result::Result<T, LeadsheetError>;

/// Result type alias for tabular store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failure reported by a tabular store backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Backend could not be reached or answered with a transient failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Backend rejected the call because a quota or rate limit was hit.
    #[error("store quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Credentials are missing, expired or lack access to the document.
    #[error("store permission denied: {0}")]
    PermissionDenied(String),

    /// Any other backend failure, including malformed backend responses.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Short machine-readable kind, used as a structured log field.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::QuotaExceeded(_) => "quota_exceeded",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Backend(_) => "backend",
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => Self::Unavailable(err.to_string()),
            // 42501 = insufficient_privilege
            sqlx::Error::Database(ref db_err) if db_err.code().as_deref() == Some("42501") => {
                Self::PermissionDenied(err.to_string())
            },
            _ => Self::Backend(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::Unavailable(err.to_string())
        } else if err.is_decode() {
            Self::Backend(format!("malformed response: {err}"))
        } else {
            Self::Backend(err.to_string())
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(err.to_string()),
            _ => Self::Backend(format!("io error: {err}")),
        }
    }
}

impl From<csv::Error> for StoreError {
    fn from(err: csv::Error) -> Self {
        match err.into_kind() {
            csv::ErrorKind::Io(io) => io.into(),
            other => Self::Backend(format!("csv error: {other:?}")),
        }
    }
}

/// Lead intake error types with stable codes.
#[derive(Debug, Error)]
pub enum LeadsheetError {
    /// Request body is not UTF-8 JSON, or is a top-level `null` (E1001).
    #[error("[E1001] Parse error: {message}")]
    Parse {
        /// Description of what failed to parse
        message: String,
    },

    /// Request body exceeds the configured size limit (E1002).
    #[error("[E1002] Payload too large: body exceeds {limit_bytes} byte limit")]
    PayloadTooLarge {
        /// Configured limit in bytes
        limit_bytes: usize,
    },

    /// Tabular store operation failed (E3001).
    #[error("[E3001] {0}")]
    Store(#[from] StoreError),
}

impl LeadsheetError {
    /// Creates a parse error from any displayable cause.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse { message: message.into() }
    }

    /// Returns the error code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "E1001",
            Self::PayloadTooLarge { .. } => "E1002",
            Self::Store(_) => "E3001",
        }
    }
}

impl From<serde_json::Error> for LeadsheetError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse(format!("invalid JSON body: {err}"))
    }
}

impl From<std::str::Utf8Error> for LeadsheetError {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::parse(format!("body is not valid UTF-8: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(LeadsheetError::parse("bad").code(), "E1001");
        assert_eq!(LeadsheetError::PayloadTooLarge { limit_bytes: 10 }.code(), "E1002");
        assert_eq!(LeadsheetError::from(StoreError::Backend("x".into())).code(), "E3001");
    }

    #[test]
    fn store_error_message_carries_through() {
        let error = LeadsheetError::from(StoreError::QuotaExceeded("100 writes/min".into()));

        assert_eq!(error.to_string(), "[E3001] store quota exceeded: 100 writes/min");
    }

    #[test]
    fn io_permission_errors_map_to_permission_denied() {
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");

        assert_eq!(StoreError::from(denied).kind(), "permission_denied");
        assert_eq!(StoreError::from(missing).kind(), "backend");
    }

    #[test]
    fn json_errors_become_parse_errors() {
        let err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();

        assert!(matches!(LeadsheetError::from(err), LeadsheetError::Parse { .. }));
    }
}
