//! Chat error classification, mirroring the retry/non-retry split used
//! for the underlying model-service errors elsewhere in the stack.

use thiserror::Error;

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ChatError {
    pub kind: ChatErrorKind,
    pub message: String,
}

impl ChatError {
    pub fn new(kind: ChatErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Timeout, message)
    }

    pub fn empty_reply() -> Self {
        Self::new(ChatErrorKind::EmptyReply, "chat returned an empty reply")
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::ServerError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::InvalidRequest, message)
    }
}

/// Matches the TAXONOMY in ERROR HANDLING DESIGN: ChatFailure covers
/// timeout, transport, or empty reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorKind {
    Network,
    Timeout,
    EmptyReply,
    ServerError,
    InvalidRequest,
}

impl ChatErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::EmptyReply | Self::ServerError
        )
    }
}
