//! Optimistic sends.
//!
//! One coordinator exists per conversation. It owns the compose draft and an
//! in-flight guard, so at most one message per conversation is unconfirmed
//! while other conversations send independently.
//!
//! ```text
//! Composed ──begin──> Optimistic ──confirm──> Confirmed
//!                          │
//!                          └─────fail──────> Failed (draft restored)
//! ```

use carelink_core::{ContactId, Message, MessageId, TempId};
use chrono::{DateTime, Utc};

/// Optimistic message ready to be appended and posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    /// Temporary id of the entry.
    pub temp_id: TempId,
    /// Trimmed body to post.
    pub content: String,
    /// Entry to append to the conversation.
    pub message: Message,
}

/// Send awaiting the server's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    /// Temporary id of the optimistic entry.
    pub temp_id: TempId,
    /// Trimmed body that was posted.
    pub content: String,
    /// Field contents at send time, restored on failure.
    pub original: String,
}

/// Compose draft and in-flight guard of one conversation.
#[derive(Debug, Clone)]
pub struct SendCoordinator {
    peer: ContactId,
    draft: String,
    in_flight: Option<InFlight>,
}

impl SendCoordinator {
    /// Create an idle coordinator for a peer.
    pub fn new(peer: ContactId) -> Self {
        Self { peer, draft: String::new(), in_flight: None }
    }

    /// Replace the draft.
    pub fn compose(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Start sending the draft.
    ///
    /// Returns `None` (and changes nothing) if the trimmed draft is empty or
    /// a send is already in flight. Otherwise clears the draft and returns the
    /// optimistic entry for the caller to append and post.
    pub fn begin(
        &mut self,
        own_id: &ContactId,
        temp_id: TempId,
        sent_at: DateTime<Utc>,
    ) -> Option<Outgoing> {
        if self.in_flight.is_some() {
            tracing::debug!(peer = %self.peer, "send ignored, previous send in flight");
            return None;
        }

        let content = self.draft.trim();
        if content.is_empty() {
            return None;
        }
        let content = content.to_string();
        let original = std::mem::take(&mut self.draft);

        let message = Message {
            id: MessageId::Local(temp_id),
            sender_id: own_id.clone(),
            text: content.clone(),
            timestamp: sent_at,
            is_own: true,
            read: false,
        };

        self.in_flight = Some(InFlight { temp_id, content: content.clone(), original });
        Some(Outgoing { temp_id, content, message })
    }

    /// Server accepted the send. Returns the finished send if `temp_id` was
    /// the one in flight.
    pub fn confirm(&mut self, temp_id: TempId) -> Option<InFlight> {
        self.take(temp_id)
    }

    /// Server rejected the send. Restores the original field contents into
    /// the draft and returns the finished send.
    pub fn fail(&mut self, temp_id: TempId) -> Option<InFlight> {
        let in_flight = self.take(temp_id)?;
        self.draft = in_flight.original.clone();
        Some(in_flight)
    }

    /// Peer this coordinator sends to.
    pub fn peer(&self) -> &ContactId {
        &self.peer
    }

    /// Current draft.
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Send awaiting the server, if any.
    pub fn in_flight(&self) -> Option<&InFlight> {
        self.in_flight.as_ref()
    }

    /// Whether `temp_id` is this coordinator's send.
    pub fn owns(&self, temp_id: TempId) -> bool {
        self.in_flight.as_ref().is_some_and(|f| f.temp_id == temp_id)
    }

    fn take(&mut self, temp_id: TempId) -> Option<InFlight> {
        if self.owns(temp_id) { self.in_flight.take() } else { None }
    }
}
