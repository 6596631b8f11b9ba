//! Conversation session.
//!
//! Owns the one piece of state every asynchronous handler races on: which
//! chat is active. The session is the single owner of that cell; handlers
//! read it through [`ConversationSession::active_chat`] at the moment they
//! run and never keep a copy across a suspension.
//!
//! Chat ids are resolved lazily. Selecting a peer whose chat is unknown
//! clears the active chat until the server answers; a known peer shows its
//! cached chat at once while the refreshed history loads.

use std::collections::HashMap;

use carelink_core::{ChatId, ContactId, ConversationKey};

/// Snapshot of the active conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveChat {
    /// Selected peer.
    pub peer: Option<ContactId>,
    /// Resolved chat of the selected peer.
    pub chat_id: Option<ChatId>,
}

/// Outcome of a chat resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The peer is still selected; its chat is now active.
    Activated,
    /// The user moved on; the mapping is recorded but nothing switched.
    Stale,
}

/// Active chat cell plus the peer/chat mapping.
#[derive(Debug, Clone, Default)]
pub struct ConversationSession {
    active: ActiveChat,
    chats: HashMap<ContactId, ChatId>,
    peers: HashMap<ChatId, ContactId>,
}

impl ConversationSession {
    /// Create a session with nothing selected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a peer.
    ///
    /// Returns `true` if the peer's chat is already known and became active.
    pub fn select(&mut self, peer: ContactId) -> bool {
        let cached = self.chats.get(&peer).cloned();
        let known = cached.is_some();
        self.active = ActiveChat { peer: Some(peer), chat_id: cached };
        known
    }

    /// Record the server's chat for a peer.
    ///
    /// Switches the active chat only if the peer is still selected.
    pub fn resolve(&mut self, peer: &ContactId, chat_id: ChatId) -> Resolution {
        self.remember(peer.clone(), chat_id.clone());

        if self.active.peer.as_ref() == Some(peer) {
            if self.active.chat_id.as_ref() != Some(&chat_id) {
                tracing::debug!(%peer, %chat_id, "chat resolved");
            }
            self.active.chat_id = Some(chat_id);
            Resolution::Activated
        } else {
            tracing::debug!(%peer, %chat_id, "stale chat resolution, active chat kept");
            Resolution::Stale
        }
    }

    /// Make a chat active regardless of the current selection.
    ///
    /// Used when focus follows an incoming message.
    pub fn focus(&mut self, chat_id: ChatId, peer: ContactId) {
        self.remember(peer.clone(), chat_id.clone());
        self.active = ActiveChat { peer: Some(peer), chat_id: Some(chat_id) };
    }

    /// Live active chat id.
    pub fn active_chat(&self) -> Option<&ChatId> {
        self.active.chat_id.as_ref()
    }

    /// Live selected peer.
    pub fn selected_peer(&self) -> Option<&ContactId> {
        self.active.peer.as_ref()
    }

    /// Live active conversation.
    pub fn active(&self) -> &ActiveChat {
        &self.active
    }

    /// Whether `chat_id` is the active chat.
    pub fn is_active(&self, chat_id: &ChatId) -> bool {
        self.active.chat_id.as_ref() == Some(chat_id)
    }

    /// Sequence key the conversation view shows.
    pub fn view_key(&self) -> Option<ConversationKey> {
        match (&self.active.chat_id, &self.active.peer) {
            (Some(chat_id), _) => Some(ConversationKey::Chat(chat_id.clone())),
            (None, Some(peer)) => Some(ConversationKey::Peer(peer.clone())),
            (None, None) => None,
        }
    }

    /// Known chat of a peer.
    pub fn chat_for(&self, peer: &ContactId) -> Option<&ChatId> {
        self.chats.get(peer)
    }

    /// Known peer of a chat.
    pub fn peer_for(&self, chat_id: &ChatId) -> Option<&ContactId> {
        self.peers.get(chat_id)
    }

    /// Sequence key for a peer: its chat once known, the peer before that.
    pub fn key_for(&self, peer: &ContactId) -> ConversationKey {
        self.chats
            .get(peer)
            .map_or_else(|| ConversationKey::Peer(peer.clone()), |c| ConversationKey::Chat(c.clone()))
    }

    fn remember(&mut self, peer: ContactId, chat_id: ChatId) {
        self.peers.insert(chat_id.clone(), peer.clone());
        self.chats.insert(peer, chat_id);
    }
}
