use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Shown when a reply arrives without a `response` field.
pub const NO_REPLY_TEXT: &str = "Couldn't fetch a response.";

/// Stands in for a reply whenever the ask request fails, whatever the reason.
pub const BACKEND_UNREACHABLE_TEXT: &str = "Backend not reachable.";

/// Local validation notice for `submit()` without a selected file.
pub const NO_FILE_SELECTED_TEXT: &str = "No file selected. Please choose your resume first.";

/// Upload failure reason when the server gave no error text.
pub const UNKNOWN_ERROR_TEXT: &str = "Unknown error.";

/// Upload failure reason when no response could be obtained.
pub const SERVER_UNREACHABLE_TEXT: &str = "Server unreachable: could not upload resume.";

pub const UPLOAD_SUCCESS_TEXT: &str =
    "Resume uploaded successfully! The assistant now knows your resume, you can start chatting.";

/// Failure of a single backend request.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request never produced a response (connection refused, DNS, reset).
    #[error("backend unreachable: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The backend answered with a non-success status.
    #[error("backend rejected request with status {status}: {}", .message.as_deref().unwrap_or(UNKNOWN_ERROR_TEXT))]
    Rejected { status: u16, message: Option<String> },

    /// A success status with a body we could not read.
    #[error("malformed backend response: {0}")]
    Decode(String),

    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// How a failure is presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ServerRejection,
    TransportFailure,
    Local,
}

impl BackendError {
    pub fn kind(&self) -> FailureKind {
        match self {
            BackendError::Rejected { .. } => FailureKind::ServerRejection,
            BackendError::Transport(_) | BackendError::Timeout(_) | BackendError::Decode(_) => {
                FailureKind::TransportFailure
            }
            BackendError::Io { .. } => FailureKind::Local,
        }
    }

    /// Reason stored in `UploadState::Failed`.
    pub fn upload_reason(&self) -> String {
        match self {
            BackendError::Rejected { message, .. } => message
                .as_deref()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(UNKNOWN_ERROR_TEXT)
                .to_string(),
            BackendError::Io { .. } => self.to_string(),
            _ => SERVER_UNREACHABLE_TEXT.to_string(),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// Why `send_turn` refused to do anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TurnRejected {
    #[error("message is empty")]
    EmptyInput,
    #[error("a reply is still pending")]
    Busy,
    #[error("no conversation is shown there")]
    Unavailable,
}

/// Why a file selection or `submit()` was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UploadRejected {
    #[error("no file selected")]
    NoFileSelected,
    #[error("an upload is already in progress")]
    InFlight,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("unknown overlay mode {0:?} (expected separate, shared or off)")]
    InvalidOverlayMode(String),
    #[error("invalid timeout {0:?}")]
    InvalidTimeout(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
