//! Error types for poll operations.

use thiserror::Error;

use super::model::{OptionId, PollId};

/// Errors surfaced by the key-value store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store could not be reached or the operation failed.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A compare-and-swap loop gave up after repeated conflicts.
    #[error("concurrent modification conflict")]
    Conflict,

    /// A persisted record could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Errors returned by poll mutation operations.
///
/// Request-path failures only; broadcast-path failures are handled inside
/// the connection registry and never reach the caller.
#[derive(Debug, Clone, Error)]
pub enum PollError {
    /// The request was rejected before any store write.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No poll exists with the given id.
    #[error("poll {0} not found")]
    NotFound(PollId),

    /// The option id does not belong to the poll.
    #[error("option {0} does not belong to this poll")]
    InvalidOption(OptionId),

    /// The store failed while handling the request.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PollError {
    pub fn validation(message: impl Into<String>) -> Self {
        PollError::Validation(message.into())
    }

    pub fn not_found(id: PollId) -> Self {
        PollError::NotFound(id)
    }

    pub fn invalid_option(id: OptionId) -> Self {
        PollError::InvalidOption(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_converts_into_poll_error() {
        let err: PollError = StoreError::Conflict.into();
        assert!(matches!(err, PollError::Store(StoreError::Conflict)));
    }

    #[test]
    fn not_found_message_includes_id() {
        let id = PollId::new();
        let err = PollError::not_found(id);
        assert!(err.to_string().contains(&id.to_string()));
    }
}
