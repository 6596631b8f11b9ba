//! Per-conversation message log.
//!
//! The store keeps one sequence per [`ConversationKey`]. Three sources race to
//! fill a sequence (history fetch, push events, fallback polling) and local
//! sends add optimistic entries, so the store enforces the properties the
//! conversation view relies on:
//!
//! - Within one sequence an id appears at most once; later arrivals of an id
//!   already present are no-ops.
//! - Insertion order is arrival order. Timestamps are never used to reorder.
//! - Confirming an optimistic entry rewrites it at its current position.
//!
//! The store never decides which chat is active. Read receipts take the active
//! chat as a parameter so the caller always passes the live value.

use std::collections::{HashMap, HashSet};

use crate::types::{ChatId, Confirmation, ContactId, ConversationKey, Message, MessageId, TempId};

/// Outcome of reconciling an optimistic entry with its confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Entry rewritten in place.
    Replaced,
    /// Entry rewritten in place and a copy of the confirmed id that arrived
    /// earlier through another source was removed.
    ReplacedDroppingEcho,
    /// The optimistic entry is gone and the confirmed id is already present.
    AlreadyPresent,
    /// The optimistic entry is gone and the confirmed id is not present; the
    /// caller owns the message and should append it.
    Missing,
}

/// Ordered, deduplicated message sequences keyed by conversation.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    sequences: HashMap<ConversationKey, Vec<Message>>,
}

impl MessageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message unless its id is already present in the sequence.
    ///
    /// Returns `true` if the message was appended.
    pub fn append(&mut self, key: &ConversationKey, message: Message) -> bool {
        let sequence = self.sequences.entry(key.clone()).or_default();
        if sequence.iter().any(|m| m.id == message.id) {
            return false;
        }
        sequence.push(message);
        true
    }

    /// Rewrite an optimistic entry with its server-confirmed identity.
    ///
    /// The entry keeps its position. If the confirmed id already arrived
    /// through another source, that later copy is removed so the id stays
    /// unique.
    pub fn replace(
        &mut self,
        key: &ConversationKey,
        temp_id: TempId,
        confirmed: &Confirmation,
    ) -> Reconciled {
        let server_id = MessageId::server(confirmed.id.clone());
        let Some(sequence) = self.sequences.get_mut(key) else {
            return Reconciled::Missing;
        };

        let local_id = MessageId::Local(temp_id);
        let Some(position) = sequence.iter().position(|m| m.id == local_id) else {
            return if sequence.iter().any(|m| m.id == server_id) {
                Reconciled::AlreadyPresent
            } else {
                Reconciled::Missing
            };
        };

        let echo = sequence.iter().position(|m| m.id == server_id);

        let entry = &mut sequence[position];
        entry.id = server_id;
        entry.timestamp = confirmed.timestamp;

        match echo {
            Some(index) => {
                sequence.remove(index);
                Reconciled::ReplacedDroppingEcho
            },
            None => Reconciled::Replaced,
        }
    }

    /// Remove an entry. Used to roll back a failed send.
    pub fn remove(&mut self, key: &ConversationKey, id: &MessageId) -> Option<Message> {
        let sequence = self.sequences.get_mut(key)?;
        let position = sequence.iter().position(|m| &m.id == id)?;
        Some(sequence.remove(position))
    }

    /// Replace a whole sequence with a fetched list.
    ///
    /// Used by history loads and fallback resyncs. Duplicate ids within the
    /// list collapse to their first occurrence.
    pub fn replace_all(&mut self, key: &ConversationKey, messages: Vec<Message>) {
        let mut seen = HashSet::new();
        let deduped = messages.into_iter().filter(|m| seen.insert(m.id.clone())).collect();
        self.sequences.insert(key.clone(), deduped);
    }

    /// Mark every message of a chat as read.
    ///
    /// Applies only when `chat_id` is the active chat; a receipt for a chat in
    /// the background is dropped. Returns the number of entries that changed.
    pub fn mark_chat_read(&mut self, chat_id: &ChatId, active: Option<&ChatId>) -> usize {
        if active != Some(chat_id) {
            tracing::debug!(%chat_id, "read receipt for background chat dropped");
            return 0;
        }

        let key = ConversationKey::Chat(chat_id.clone());
        self.sequences.get_mut(&key).map_or(0, |sequence| {
            sequence.iter_mut().filter(|m| !m.read).map(|m| m.read = true).count()
        })
    }

    /// Fold a peer-keyed sequence into the chat the server assigned.
    ///
    /// Entries keep their order and land after the chat's existing entries.
    /// Returns the number of entries moved.
    pub fn adopt(&mut self, peer: &ContactId, chat_id: &ChatId) -> usize {
        let Some(pending) = self.sequences.remove(&ConversationKey::Peer(peer.clone())) else {
            return 0;
        };

        let key = ConversationKey::Chat(chat_id.clone());
        pending.into_iter().filter(|m| self.append(&key, m.clone())).count()
    }

    /// Messages of a conversation, in arrival order.
    pub fn messages(&self, key: &ConversationKey) -> &[Message] {
        self.sequences.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether the conversation holds the given id.
    pub fn contains(&self, key: &ConversationKey, id: &MessageId) -> bool {
        self.messages(key).iter().any(|m| &m.id == id)
    }

    /// Position of an id within its conversation.
    pub fn position(&self, key: &ConversationKey, id: &MessageId) -> Option<usize> {
        self.messages(key).iter().position(|m| &m.id == id)
    }

    /// All sequences.
    pub fn sequences(&self) -> impl Iterator<Item = (&ConversationKey, &[Message])> {
        self.sequences.iter().map(|(key, seq)| (key, seq.as_slice()))
    }
}
