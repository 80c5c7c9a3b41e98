//! Error types for permload.

use thiserror::Error;

/// One entry of an error body returned by the platform.
///
/// v2 responses carry a single `error_code`/`description` pair, v3 responses
/// carry a list of `title`/`detail` pairs. Both are folded into this shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiErrorEntry {
    /// Symbolic code, e.g. `CF-OrganizationNameTaken`.
    pub code: String,
    /// Human readable detail, e.g. `name must be unique in space`.
    pub detail: String,
}

/// Failure reported by (or while talking to) the remote platform.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error {status}: {}", describe_entries(.entries))]
    Status {
        status: u16,
        entries: Vec<ApiErrorEntry>,
    },

    #[error("Decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// Shorthand for a status error with a single entry.
    pub fn status(status: u16, code: impl Into<String>, detail: impl Into<String>) -> Self {
        ApiError::Status {
            status,
            entries: vec![ApiErrorEntry {
                code: code.into(),
                detail: detail.into(),
            }],
        }
    }

    /// True if any entry carries the given symbolic code.
    pub fn has_code(&self, code: &str) -> bool {
        match self {
            ApiError::Status { entries, .. } => entries.iter().any(|e| e.code == code),
            _ => false,
        }
    }

    /// True if any entry carries the given detail text.
    pub fn has_detail(&self, detail: &str) -> bool {
        match self {
            ApiError::Status { entries, .. } => entries.iter().any(|e| e.detail == detail),
            _ => false,
        }
    }
}

fn describe_entries(entries: &[ApiErrorEntry]) -> String {
    if entries.is_empty() {
        return "no error body".to_string();
    }
    entries
        .iter()
        .map(|e| format!("{} ({})", e.code, e.detail))
        .collect::<Vec<_>>()
        .join("; ")
}

/// How the provisioner treats a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The resource already exists in scope; the call counts as a success.
    Conflict,
    /// Worth retrying under the backoff schedule.
    Transient,
    /// Propagated immediately.
    Fatal,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Remote API error: {0}")]
    Api(#[from] ApiError),

    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        last: ApiError,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Window selection error: {0}")]
    Window(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Collector already frozen")]
    CollectorFrozen,

    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
