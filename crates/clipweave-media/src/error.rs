//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0} not found in PATH")]
    ToolNotFound(String),

    #[error("Fetch failed for {url}: {reason}")]
    Fetch {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("FFprobe failed on {}: {message}", path.display())]
    Probe {
        path: PathBuf,
        message: String,
        stderr: Option<String>,
    },

    #[error("Encoding failed: {message}")]
    Encode {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Concatenation failed: {message}")]
    Concat {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create a fetch failure error.
    pub fn fetch_failed(url: impl Into<String>, status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            status,
            reason: reason.into(),
        }
    }

    /// Create a probe failure error.
    pub fn probe_failed(path: impl Into<PathBuf>, message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::Probe {
            path: path.into(),
            message: message.into(),
            stderr,
        }
    }

    /// Create an encoder failure error.
    pub fn encode_failed(message: impl Into<String>, stderr: Option<String>, exit_code: Option<i32>) -> Self {
        Self::Encode {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a concatenation failure error.
    pub fn concat_failed(message: impl Into<String>, stderr: Option<String>, exit_code: Option<i32>) -> Self {
        Self::Concat {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Short label of the operation that failed, suitable for user-facing messages.
    pub fn stage_label(&self) -> &'static str {
        match self {
            MediaError::Fetch { .. } => "fetch",
            MediaError::Probe { .. } => "probe",
            MediaError::Encode { .. } => "encode",
            MediaError::Concat { .. } => "concat",
            MediaError::ToolNotFound(_) => "setup",
            MediaError::InvalidInput(_) => "input",
            MediaError::Cancelled | MediaError::Timeout(_) => "process",
            MediaError::Io(_) => "io",
        }
    }

    /// Captured tool stderr, if any. Meant for server-side logs only.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            MediaError::Probe { stderr, .. }
            | MediaError::Encode { stderr, .. }
            | MediaError::Concat { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }

    /// HTTP status of a failed fetch, if the server answered at all.
    pub fn fetch_status(&self) -> Option<u16> {
        match self {
            MediaError::Fetch { status, .. } => *status,
            _ => None,
        }
    }
}
