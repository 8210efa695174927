//! Input rules shared by the server and the command-line client.
//!
//! Both sides run the same checks: the client so that a bad name never
//! reaches the network, the server because the client is not trusted.

use thiserror::Error;

pub const MAX_NAME_CHARS: usize = 30;
pub const MAX_MESSAGE_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("name is empty")]
    Empty,
    #[error("name is {len} characters, the limit is {max}", max = MAX_NAME_CHARS)]
    TooLong { len: usize },
    #[error("name contains {0:?}; only letters, digits, space, '_' and '-' are allowed")]
    IllegalChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("message is empty")]
    Empty,
    #[error("message is {len} characters, the limit is {max}", max = MAX_MESSAGE_CHARS)]
    TooLong { len: usize },
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-')
}

/// Trim `raw` and check it against the name rules. Returns the trimmed name.
pub fn validate_name(raw: &str) -> Result<&str, NameError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(NameError::Empty);
    }

    let len = name.chars().count();
    if len > MAX_NAME_CHARS {
        return Err(NameError::TooLong { len });
    }

    match name.chars().find(|c| !is_name_char(*c)) {
        Some(c) => Err(NameError::IllegalChar(c)),
        None => Ok(name),
    }
}

/// Trim `raw` and check it against the message rules. Returns the trimmed text.
pub fn validate_message(raw: &str) -> Result<&str, MessageError> {
    let message = raw.trim();
    if message.is_empty() {
        return Err(MessageError::Empty);
    }

    let len = message.chars().count();
    if len > MAX_MESSAGE_CHARS {
        return Err(MessageError::TooLong { len });
    }

    Ok(message)
}
