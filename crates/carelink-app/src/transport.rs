//! Transport traits for the external collaborators.
//!
//! The sync core never talks HTTP or WebSocket itself. The surrounding shell
//! provides a [`RestApi`] (bearer token injection, global 401 handling) and a
//! [`PushChannel`] (handshake and reconnect policy); the [`crate::Runtime`]
//! only sees their results.

use std::future::Future;

use carelink_core::{ApiError, ChatId, ContactId};
use carelink_proto::{
    ChatEnvelope, ContactRecord, MessageRecord, PushEvent, SendMessageRequest, SendReceipt,
};

/// REST operations consumed by the sync core.
///
/// Implementations are cloned into every spawned request, so cloning must be
/// cheap (an `Arc` around the HTTP client).
pub trait RestApi: Clone + Send + Sync + 'static {
    /// `GET` contacts.
    fn fetch_contacts(&self)
    -> impl Future<Output = Result<Vec<ContactRecord>, ApiError>> + Send;

    /// `GET` chat-with-peer: fetch or create the chat with a peer.
    fn fetch_chat_with(
        &self,
        peer: &ContactId,
    ) -> impl Future<Output = Result<ChatEnvelope, ApiError>> + Send;

    /// `GET` messages-for-chat.
    fn fetch_messages(
        &self,
        chat_id: &ChatId,
    ) -> impl Future<Output = Result<Vec<MessageRecord>, ApiError>> + Send;

    /// `POST` send-message to a peer.
    fn send_message(
        &self,
        peer: &ContactId,
        request: SendMessageRequest,
    ) -> impl Future<Output = Result<SendReceipt, ApiError>> + Send;

    /// `PATCH` mark-chat-read. The body is ignored.
    fn mark_chat_read(&self, chat_id: &ChatId) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// Observable signal of the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushSignal {
    /// First successful connection.
    Connected,
    /// Connection lost; the transport is retrying.
    Disconnected,
    /// Connection restored after a loss.
    Reconnected,
    /// Decoded event.
    Event(PushEvent),
    /// Raw text frame, decoded by the runtime.
    Frame(String),
}

/// Subscription to the push channel.
pub trait PushChannel: Send + 'static {
    /// Next signal. `None` means the channel is closed for good.
    fn next_signal(&mut self) -> impl Future<Output = Option<PushSignal>> + Send;

    /// Current connectivity.
    fn is_connected(&self) -> bool;
}
