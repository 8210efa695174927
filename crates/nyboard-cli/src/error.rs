use std::path::PathBuf;

use thiserror::Error;

use nyboard_types::validate::{MessageError, NameError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    InvalidName(#[from] NameError),
    #[error(transparent)]
    InvalidMessage(#[from] MessageError),
    #[error("already submitted as {name} (rank {rank})")]
    AlreadySubmitted { name: String, rank: u64 },
    #[error("submit a name before posting messages")]
    NotEligible,
    #[error("another request is still running (lock file {})", .0.display())]
    Busy(PathBuf),
    #[error("{message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Http(#[source] reqwest::Error),
    #[error(transparent)]
    State(#[from] anyhow::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

impl ClientError {
    /// Whether running the same command again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Http(_) | Self::Busy(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Failures that happened after a request was sent. These share one
    /// "submit failed" headline.
    pub fn is_request_failure(&self) -> bool {
        matches!(self, Self::Api { .. } | Self::Timeout | Self::Http(_))
    }

    /// Server error code, when the server answered with one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}
