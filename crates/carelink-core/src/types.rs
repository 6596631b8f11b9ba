//! Domain types shared by every sync component.

use std::fmt;

use chrono::{DateTime, Utc};

/// Stable identifier of a staff member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContactId(String);

impl ContactId {
    /// Wrap a raw id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContactId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Server-assigned chat identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(String);

impl ChatId {
    /// Wrap a raw id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChatId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Client-generated id of an unconfirmed outgoing message.
///
/// Derived from the wall clock; the sequence number keeps two sends issued in
/// the same millisecond apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TempId {
    millis: i64,
    seq: u64,
}

impl TempId {
    /// Create a temporary id.
    pub fn new(millis: i64, seq: u64) -> Self {
        Self { millis, seq }
    }

    /// Wall clock milliseconds the id was minted at.
    pub fn millis(&self) -> i64 {
        self.millis
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local-{}-{}", self.millis, self.seq)
    }
}

/// Identity of a message within a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// Optimistic entry awaiting server confirmation.
    Local(TempId),
    /// Server-confirmed entry.
    Server(String),
}

impl MessageId {
    /// Server id.
    pub fn server(id: impl Into<String>) -> Self {
        Self::Server(id.into())
    }

    /// Whether this is a temporary, unconfirmed id.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(temp) => temp.fmt(f),
            Self::Server(id) => f.write_str(id),
        }
    }
}

/// Key of a message sequence.
///
/// A conversation is keyed by its peer until the server has assigned a chat
/// id, and by the chat id afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConversationKey {
    /// Resolved chat.
    Chat(ChatId),
    /// Conversation with a peer whose chat id is not known yet.
    Peer(ContactId),
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat(id) => write!(f, "chat:{id}"),
            Self::Peer(id) => write!(f, "peer:{id}"),
        }
    }
}

/// Presence of a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PresenceStatus {
    /// Connected and available.
    Online,
    /// Connected, do not disturb.
    Busy,
    /// Not connected (also the default for unknown values).
    #[default]
    Offline,
}

impl PresenceStatus {
    /// Parse a wire status string. Absent or unknown values are offline.
    pub fn from_wire(status: Option<&str>) -> Self {
        match status.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("online" | "available") => Self::Online,
            Some("busy" | "dnd") => Self::Busy,
            _ => Self::Offline,
        }
    }
}

/// Normalized roster entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// Stable id.
    pub id: ContactId,
    /// Name shown in the roster.
    pub display_name: String,
    /// Avatar initial derived from the display name.
    pub initial: char,
    /// Staff role.
    pub role: Option<String>,
    /// Current presence.
    pub status: PresenceStatus,
    /// Unread messages from this contact (server-counted).
    pub unread_count: u32,
    /// Roster grouping.
    pub category: Option<String>,
}

/// Normalized message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Temporary or server id.
    pub id: MessageId,
    /// Author.
    pub sender_id: ContactId,
    /// Body.
    pub text: String,
    /// Creation time (server time once confirmed).
    pub timestamp: DateTime<Utc>,
    /// Authored by the current user.
    pub is_own: bool,
    /// Read by the recipient.
    pub read: bool,
}

/// Server-confirmed identity of an optimistic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// Server id.
    pub id: String,
    /// Server timestamp.
    pub timestamp: DateTime<Utc>,
}
