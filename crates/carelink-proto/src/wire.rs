//! REST record shapes.
//!
//! Every field is optional and known aliases are modelled as sibling fields
//! (`id` next to `_id`) rather than serde aliases, because some endpoints send
//! both and serde rejects duplicate aliased keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier as it appears on the wire: a JSON string or an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    /// String identifier (document ids, UUIDs).
    Text(String),
    /// Numeric identifier (row ids).
    Number(i64),
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for WireId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for WireId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for WireId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

/// First usable id among the canonical and legacy fields.
///
/// Blank strings count as absent.
fn pick_id(primary: Option<&WireId>, legacy: Option<&WireId>) -> Option<String> {
    let usable = |id: &WireId| {
        let s = id.to_string();
        if s.trim().is_empty() { None } else { Some(s) }
    };
    primary.and_then(usable).or_else(|| legacy.and_then(usable))
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Roster entry from `GET contacts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactRecord {
    /// Canonical id.
    pub id: Option<WireId>,
    /// Legacy document id.
    #[serde(rename = "_id")]
    pub legacy_id: Option<WireId>,
    /// Preferred display name.
    pub full_name: Option<String>,
    /// Fallback display name.
    pub name: Option<String>,
    /// Staff role (nurse, physician, ...).
    pub role: Option<String>,
    /// Presence status string; absent means offline.
    pub status: Option<String>,
    /// Roster grouping.
    pub category: Option<String>,
    /// Unread messages from this contact, as counted by the server.
    pub unread_count: Option<i64>,
}

impl ContactRecord {
    /// Create a record with a canonical id and full name.
    pub fn new(id: impl Into<WireId>, full_name: impl Into<String>) -> Self {
        Self { id: Some(id.into()), full_name: Some(full_name.into()), ..Self::default() }
    }

    /// Set the presence status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Set the staff role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the unread count.
    #[must_use]
    pub fn with_unread(mut self, count: i64) -> Self {
        self.unread_count = Some(count);
        self
    }

    /// Resolved id (`id`, then `_id`).
    pub fn resolved_id(&self) -> Option<String> {
        pick_id(self.id.as_ref(), self.legacy_id.as_ref())
    }

    /// Resolved display name (`fullName`, then `name`).
    pub fn display_name(&self) -> Option<&str> {
        non_blank(self.full_name.as_ref()).or_else(|| non_blank(self.name.as_ref()))
    }
}

/// Message entry from chat history, message listings and push events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessageRecord {
    /// Canonical id.
    pub id: Option<WireId>,
    /// Legacy document id.
    #[serde(rename = "_id")]
    pub legacy_id: Option<WireId>,
    /// Author's contact id.
    pub sender_id: Option<WireId>,
    /// Message body.
    pub content: Option<String>,
    /// RFC 3339 timestamp.
    pub timestamp: Option<String>,
    /// Whether the recipient has read the message.
    pub read: Option<bool>,
}

impl MessageRecord {
    /// Create a complete record.
    pub fn new(
        id: impl Into<WireId>,
        sender_id: impl Into<WireId>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            sender_id: Some(sender_id.into()),
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Set the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Set the read flag.
    #[must_use]
    pub fn with_read(mut self, read: bool) -> Self {
        self.read = Some(read);
        self
    }

    /// Resolved id (`id`, then `_id`).
    pub fn resolved_id(&self) -> Option<String> {
        pick_id(self.id.as_ref(), self.legacy_id.as_ref())
    }

    /// Resolved sender id.
    pub fn resolved_sender(&self) -> Option<String> {
        pick_id(self.sender_id.as_ref(), None)
    }
}

/// Response of `GET chat-with-peer(id)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatEnvelope {
    /// Canonical chat id.
    pub chat_id: Option<WireId>,
    /// Legacy document id.
    #[serde(rename = "_id")]
    pub legacy_id: Option<WireId>,
    /// Chat history, oldest first.
    pub messages: Vec<MessageRecord>,
}

impl ChatEnvelope {
    /// Create an envelope.
    pub fn new(chat_id: impl Into<WireId>, messages: Vec<MessageRecord>) -> Self {
        Self { chat_id: Some(chat_id.into()), legacy_id: None, messages }
    }

    /// Resolved chat id (`chatId`, then `_id`).
    pub fn resolved_chat_id(&self) -> Option<String> {
        pick_id(self.chat_id.as_ref(), self.legacy_id.as_ref())
    }
}

/// Body of `POST send-message(peerId)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    /// Message body.
    pub content: String,
}

/// Server-assigned identity of a freshly created message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmedRecord {
    /// Canonical id.
    pub id: Option<WireId>,
    /// Legacy document id.
    #[serde(rename = "_id")]
    pub legacy_id: Option<WireId>,
    /// RFC 3339 timestamp.
    pub timestamp: Option<String>,
}

impl ConfirmedRecord {
    /// Resolved id (`id`, then `_id`).
    pub fn resolved_id(&self) -> Option<String> {
        pick_id(self.id.as_ref(), self.legacy_id.as_ref())
    }
}

/// Response of `POST send-message(peerId)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SendReceipt {
    /// Chat the message landed in (created on first message).
    pub chat_id: Option<WireId>,
    /// Confirmed message identity.
    pub message: Option<ConfirmedRecord>,
}

impl SendReceipt {
    /// Create a receipt.
    pub fn new(
        chat_id: impl Into<WireId>,
        message_id: impl Into<WireId>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            chat_id: Some(chat_id.into()),
            message: Some(ConfirmedRecord {
                id: Some(message_id.into()),
                legacy_id: None,
                timestamp: Some(timestamp.into()),
            }),
        }
    }

    /// Resolved chat id.
    pub fn resolved_chat_id(&self) -> Option<String> {
        pick_id(self.chat_id.as_ref(), None)
    }
}
