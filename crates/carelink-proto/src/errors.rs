//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while decoding or encoding wire payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Push frame was not valid JSON or did not match any known event shape.
    #[error("undecodable push frame: {0}")]
    Decode(String),

    /// Payload could not be serialized.
    #[error("encoding failed: {0}")]
    Encode(String),
}
