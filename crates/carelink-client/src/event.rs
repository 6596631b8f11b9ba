//! Client events and actions.

use carelink_core::{ApiError, ChatId, ContactId, TempId};
use carelink_proto::{ChatEnvelope, ContactRecord, MessageRecord, PushEvent, SendReceipt};

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Executing the REST calls the client asks for and feeding back results
/// - Forwarding push channel signals
/// - Driving time forward via ticks
/// - Forwarding user intents (select, compose, send)
///
/// Generic over `I` (Instant type) to support both production and paused
/// tokio time in simulation.
#[derive(Debug, Clone)]
pub enum ClientEvent<I = std::time::Instant> {
    /// Session started: load the roster and arm the refresh timer.
    Start,

    /// Time tick for timers.
    ///
    /// The caller should send ticks periodically; the roster refresh and the
    /// fallback poller are only evaluated here.
    Tick {
        /// Current time from the environment.
        now: I,
    },

    /// User selected a contact in the roster.
    SelectContact {
        /// Selected peer.
        peer: ContactId,
    },

    /// User edited the compose field of the selected conversation.
    ComposeChanged {
        /// Full field contents.
        text: String,
    },

    /// User pressed send in the selected conversation.
    Send,

    /// Roster fetch completed.
    ContactsFetched {
        /// Whether the fetch was a background refresh.
        silent: bool,
        /// Raw roster or the failure.
        result: Result<Vec<ContactRecord>, ApiError>,
    },

    /// Fetch-or-create chat with a peer completed.
    ChatResolved {
        /// Peer the chat was requested for.
        peer: ContactId,
        /// Chat envelope with its history, or the failure.
        result: Result<ChatEnvelope, ApiError>,
    },

    /// Message fetch for a chat completed (history refresh or fallback poll).
    MessagesFetched {
        /// Chat the fetch was issued for.
        chat_id: ChatId,
        /// Messages or the failure.
        result: Result<Vec<MessageRecord>, ApiError>,
    },

    /// Send request completed.
    MessagePosted {
        /// Temporary id of the optimistic entry.
        temp_id: TempId,
        /// Server receipt or the failure.
        result: Result<SendReceipt, ApiError>,
    },

    /// Event delivered by the push channel.
    Push(PushEvent),

    /// Push channel connected for the first time.
    PushConnected,

    /// Push channel lost its connection.
    PushDisconnected,

    /// Push channel connected again after a loss.
    PushReconnected,

    /// Session teardown: cancel timers.
    Shutdown,
}

/// Notices surfaced to the UI shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A send failed. Blocking: the user must acknowledge it.
    SendFailed {
        /// Conversation the message was for.
        peer: ContactId,
        /// Text restored into the compose field.
        text: String,
        /// Human readable cause.
        reason: String,
    },

    /// The active conversation followed an incoming message.
    FocusFollowed {
        /// Newly active chat.
        chat_id: ChatId,
        /// Newly selected peer.
        peer: ContactId,
    },
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Fetch the roster; feed back [`ClientEvent::ContactsFetched`].
    FetchContacts {
        /// Background refresh without loading indicator.
        silent: bool,
    },

    /// Fetch or create the chat with a peer; feed back
    /// [`ClientEvent::ChatResolved`].
    ResolveChat {
        /// Peer to resolve.
        peer: ContactId,
    },

    /// Fetch a chat's messages; feed back [`ClientEvent::MessagesFetched`].
    FetchMessages {
        /// Chat to fetch.
        chat_id: ChatId,
    },

    /// Post a message; feed back [`ClientEvent::MessagePosted`].
    PostMessage {
        /// Temporary id of the optimistic entry.
        temp_id: TempId,
        /// Recipient.
        peer: ContactId,
        /// Trimmed message body.
        content: String,
    },

    /// Mark a chat read server-side. Best effort: no result is fed back.
    MarkChatRead {
        /// Chat to mark.
        chat_id: ChatId,
    },

    /// Surface a notice to the UI shell.
    Notify(Notice),
}
