//! Error types for the sync core.
//!
//! Two families: [`ApiError`] describes a failed REST call to the backend,
//! [`MalformedRecord`] describes a wire record that normalization rejected.
//! Neither is fatal on its own; callers decide whether a failure is dropped,
//! retried on the next tick, or surfaced to the user.

use thiserror::Error;

/// Failure of a REST call against the messaging backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Network-level failure (connection refused, timeout, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// Backend answered with a non-success status.
    #[error("backend returned status {code}")]
    Status {
        /// HTTP status code.
        code: u16,
    },

    /// Session is no longer authorized.
    ///
    /// Logout is handled by the surrounding HTTP client; the sync core only
    /// treats the call as failed.
    #[error("unauthorized")]
    Unauthorized,

    /// Response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Returns true if this error may succeed on retry.
    ///
    /// Transport failures and server-side errors are transient; client errors
    /// and undecodable bodies will fail the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { code } => *code >= 500 || *code == 429,
            Self::Unauthorized | Self::Decode(_) => false,
        }
    }
}

/// Wire record rejected during normalization.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedRecord {
    /// Record has neither `id` nor `_id`.
    #[error("record has no id")]
    MissingId,

    /// Message has no `content`.
    #[error("message has no content")]
    MissingContent,

    /// Message has no `senderId`.
    #[error("message has no sender")]
    MissingSender,

    /// Event or envelope has no chat id.
    #[error("payload has no chat id")]
    MissingChatId,

    /// Presence event has no user id.
    #[error("presence event has no user id")]
    MissingUserId,
}
