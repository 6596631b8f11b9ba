//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable sync state at a point in time. Invariants
//! operate on snapshots rather than live state so a check never races the
//! runtime loop.

use std::collections::HashMap;

use carelink_app::SyncSnapshot;
use carelink_client::{ActiveChat, Client};
use carelink_core::{Contact, ContactId, ConversationKey, Message, TempId, env::Environment};

/// Snapshot of one client's sync state.
#[derive(Debug, Clone)]
pub struct SystemSnapshot {
    /// Current user.
    pub self_id: ContactId,
    /// Active conversation.
    pub active: ActiveChat,
    /// Every cached conversation.
    pub sequences: HashMap<ConversationKey, Vec<Message>>,
    /// Roster.
    pub contacts: Vec<Contact>,
    /// Temporary ids of sends awaiting the server.
    pub pending: Vec<TempId>,
}

impl SystemSnapshot {
    /// Snapshot with no state, for a user that has not started syncing.
    pub fn empty(self_id: ContactId) -> Self {
        Self {
            self_id,
            active: ActiveChat::default(),
            sequences: HashMap::new(),
            contacts: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Snapshot of a client state machine.
    pub fn from_client<E: Environment>(client: &Client<E>) -> Self {
        Self {
            self_id: client.self_id().clone(),
            active: client.active().clone(),
            sequences: client
                .store()
                .sequences()
                .map(|(key, messages)| (key.clone(), messages.to_vec()))
                .collect(),
            contacts: client.directory().contacts().to_vec(),
            pending: client.pending_sends().map(|send| send.temp_id).collect(),
        }
    }

    /// Snapshot of a running runtime.
    pub fn from_sync(sync: &SyncSnapshot) -> Self {
        Self {
            self_id: sync.directory.self_id().clone(),
            active: sync.active.clone(),
            sequences: sync
                .store
                .sequences()
                .map(|(key, messages)| (key.clone(), messages.to_vec()))
                .collect(),
            contacts: sync.directory.contacts().to_vec(),
            pending: sync.pending.clone(),
        }
    }

    /// Add a conversation.
    #[must_use]
    pub fn with_sequence(mut self, key: ConversationKey, messages: Vec<Message>) -> Self {
        self.sequences.insert(key, messages);
        self
    }

    /// Set the active conversation.
    #[must_use]
    pub fn with_active(mut self, active: ActiveChat) -> Self {
        self.active = active;
        self
    }

    /// Messages of a conversation.
    pub fn messages(&self, key: &ConversationKey) -> &[Message] {
        self.sequences.get(key).map(Vec::as_slice).unwrap_or_default()
    }
}
