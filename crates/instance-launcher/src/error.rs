//! Error types for provider calls.

use thiserror::Error;

/// Errors that can occur while talking to the provider API.
#[derive(Debug, Error)]
pub enum LauncherError {
    /// Connection failure, timeout, or a body that could not be read
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider rejected the API key
    #[error("API key rejected (status {status})")]
    Unauthorized { status: u16 },

    /// Any other non-success status
    #[error("API error (status {status}): {body}")]
    Status { status: u16, body: String },

    /// Response body did not have the expected shape
    #[error("Decode error: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for LauncherError {
    fn from(err: serde_json::Error) -> Self {
        LauncherError::Decode(err.to_string())
    }
}

/// Coarse classification used in log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transport,
    Auth,
    Decode,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorClass::Transport => "transport",
            ErrorClass::Auth => "auth",
            ErrorClass::Decode => "decode",
        };
        f.write_str(s)
    }
}

impl LauncherError {
    pub fn class(&self) -> ErrorClass {
        match self {
            LauncherError::Transport(e) if e.is_decode() => ErrorClass::Decode,
            LauncherError::Transport(_) | LauncherError::Status { .. } => ErrorClass::Transport,
            LauncherError::Unauthorized { .. } => ErrorClass::Auth,
            LauncherError::Decode(_) => ErrorClass::Decode,
        }
    }
}

pub type Result<T> = std::result::Result<T, LauncherError>;
