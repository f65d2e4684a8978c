use std::fmt;

use thiserror::Error;

/// Transport-level failure of a status, jobs or action call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Decode,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Decode => write!(f, "unreadable response"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

/// Why an action dispatch did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The backend refused; `message` is its own explanation, untouched.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] FetchError),
}

impl DispatchError {
    /// Text surfaced to the user.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}
