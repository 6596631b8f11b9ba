//! Runtime errors.

use carelink_client::ClientError;
use thiserror::Error;

/// Errors returned to holders of a [`crate::RuntimeHandle`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The runtime loop has exited; the command channel is closed.
    #[error("sync runtime stopped")]
    Stopped,

    /// The client rejected the command.
    #[error("command rejected: {0}")]
    Rejected(#[from] ClientError),
}
