use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use nyboard_db::StoreError;
use nyboard_types::api::ErrorBody;
use nyboard_types::validate::{MAX_MESSAGE_CHARS, MessageError, NameError};

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("invalid name: {0}")]
    InvalidName(#[from] NameError),
    #[error("this client has already submitted a name")]
    AlreadySubmitted,
    #[error("the name {0:?} is already on the board")]
    DuplicateName(String),
    #[error("submit a name before posting messages")]
    NotEligible,
    #[error("message is empty")]
    EmptyMessage,
    #[error("message is {len} characters, the limit is {max}")]
    TooLong { len: usize, max: usize },
    #[error("{0:?} is not on the board")]
    NotFound(String),
    #[error("request timed out")]
    Timeout,
    #[error("request failed")]
    RequestFailed(#[source] anyhow::Error),
}

impl BoardError {
    /// Stable machine-readable code, sent as `error` in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidName(_) => "invalid_name",
            Self::AlreadySubmitted => "already_submitted",
            Self::DuplicateName(_) => "duplicate_name",
            Self::NotEligible => "not_eligible",
            Self::EmptyMessage => "empty_message",
            Self::TooLong { .. } => "too_long",
            Self::NotFound(_) => "not_found",
            Self::Timeout => "timeout",
            Self::RequestFailed(_) => "request_failed",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidName(_) | Self::EmptyMessage | Self::TooLong { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::AlreadySubmitted | Self::DuplicateName(_) => StatusCode::CONFLICT,
            Self::NotEligible => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::RequestFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MessageError> for BoardError {
    fn from(err: MessageError) -> Self {
        match err {
            MessageError::Empty => Self::EmptyMessage,
            MessageError::TooLong { len } => Self::TooLong {
                len,
                max: MAX_MESSAGE_CHARS,
            },
        }
    }
}

impl From<StoreError> for BoardError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { key } => Self::DuplicateName(key),
            StoreError::Backend(e) => Self::RequestFailed(e),
        }
    }
}

impl IntoResponse for BoardError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::RequestFailed(e) => error!("Request failed: {:#}", e),
            other => warn!("Rejected request: {}", other),
        }

        let body = ErrorBody {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_duplicates_become_duplicate_name() {
        let err: BoardError = StoreError::Duplicate { key: "Alice".into() }.into();
        assert!(matches!(err, BoardError::DuplicateName(ref n) if n == "Alice"));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn message_errors_keep_their_kind() {
        assert_eq!(BoardError::from(MessageError::Empty).code(), "empty_message");
        let too_long = BoardError::from(MessageError::TooLong { len: 51 });
        assert_eq!(too_long.code(), "too_long");
        assert_eq!(too_long.to_string(), "message is 51 characters, the limit is 50");
    }

    #[test]
    fn backend_details_stay_out_of_the_message() {
        let err = BoardError::RequestFailed(anyhow::anyhow!("disk I/O error at /var/lib"));
        assert_eq!(err.to_string(), "request failed");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
