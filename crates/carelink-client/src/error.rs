//! Client error types.

use thiserror::Error;

/// Errors from misuse of the client by its caller.
///
/// Network failures never surface here: they come back as events and are
/// handled inside the state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Compose or send without a selected conversation.
    #[error("no conversation selected")]
    NoConversation,

    /// The current user cannot open a conversation with themself.
    #[error("cannot select the current user")]
    SelfSelected,
}
