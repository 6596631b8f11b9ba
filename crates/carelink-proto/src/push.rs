//! Push channel events.
//!
//! The push transport delivers JSON text frames of the form
//! `{"event": "<kind>", "data": {...}}`. Three kinds are consumed; anything
//! else fails to decode and is dropped by the caller.

use serde::{Deserialize, Serialize};

use crate::{
    errors::{ProtocolError, Result},
    wire::{MessageRecord, WireId},
};

/// Server-initiated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum PushEvent {
    /// A message was created in some chat.
    MessageCreated(MessageCreated),
    /// The peer read every message of a chat.
    MessageRead(MessageRead),
    /// A contact's presence changed.
    PresenceChanged(PresenceChanged),
}

/// Payload of `message-created`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessageCreated {
    /// Chat the message belongs to.
    pub chat_id: Option<WireId>,
    /// The message itself.
    pub message: Option<MessageRecord>,
}

/// Payload of `message-read`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessageRead {
    /// Chat whose messages were read.
    pub chat_id: Option<WireId>,
}

/// Payload of `presence-changed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PresenceChanged {
    /// Contact whose presence changed.
    pub user_id: Option<WireId>,
    /// New presence status string.
    pub status: Option<String>,
}

impl PushEvent {
    /// `message-created` for a chat.
    pub fn message_created(chat_id: impl Into<WireId>, message: MessageRecord) -> Self {
        Self::MessageCreated(MessageCreated {
            chat_id: Some(chat_id.into()),
            message: Some(message),
        })
    }

    /// `message-read` for a chat.
    pub fn message_read(chat_id: impl Into<WireId>) -> Self {
        Self::MessageRead(MessageRead { chat_id: Some(chat_id.into()) })
    }

    /// `presence-changed` for a contact.
    pub fn presence_changed(user_id: impl Into<WireId>, status: impl Into<String>) -> Self {
        Self::PresenceChanged(PresenceChanged {
            user_id: Some(user_id.into()),
            status: Some(status.into()),
        })
    }

    /// Wire name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MessageCreated(_) => "message-created",
            Self::MessageRead(_) => "message-read",
            Self::PresenceChanged(_) => "presence-changed",
        }
    }

    /// Decode a push frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Decode` if the frame is not JSON or names an unknown
    ///   event kind.
    pub fn decode(frame: &str) -> Result<Self> {
        serde_json::from_str(frame).map_err(|e| ProtocolError::Decode(e.to_string()))
    }

    /// Encode as a push frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Encode` if serialization fails.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}
