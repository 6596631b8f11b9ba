//! Push event bridge.
//!
//! Translates decoded push events into mutations of the directory, the store
//! and the session. The bridge is stateless apart from its focus policy; the
//! active chat is read from the session each time an event is applied.

use carelink_core::{
    ChatId, ContactDirectory, ContactId, ConversationKey, MalformedRecord, MessageStore,
    PresenceStatus, normalize,
};
use carelink_proto::{
    PushEvent,
    push::{MessageCreated, MessageRead, PresenceChanged},
};
use chrono::{DateTime, Utc};

use crate::{
    config::FocusPolicy,
    event::{ClientAction, Notice},
    session::ConversationSession,
};

/// Mutable sync state a push event may touch.
pub struct SyncState<'a> {
    /// Roster.
    pub directory: &'a mut ContactDirectory,
    /// Message log.
    pub store: &'a mut MessageStore,
    /// Active chat owner.
    pub session: &'a mut ConversationSession,
}

/// Applies push events to the sync state.
#[derive(Debug, Clone, Copy, Default)]
pub struct PushEventBridge {
    policy: FocusPolicy,
}

impl PushEventBridge {
    /// Create a bridge with the given focus policy.
    pub fn new(policy: FocusPolicy) -> Self {
        Self { policy }
    }

    /// Focus policy in use.
    pub fn policy(&self) -> FocusPolicy {
        self.policy
    }

    /// Apply one event.
    ///
    /// Payloads missing required fields are dropped with a warning.
    /// `received_at` stamps messages that carry no timestamp.
    pub fn apply(
        &self,
        event: PushEvent,
        state: SyncState<'_>,
        received_at: DateTime<Utc>,
    ) -> Vec<ClientAction> {
        let kind = event.kind();
        let result = match event {
            PushEvent::MessageCreated(created) => self.message_created(created, state, received_at),
            PushEvent::MessageRead(read) => Self::message_read(&read, state),
            PushEvent::PresenceChanged(presence) => Self::presence_changed(&presence, state),
        };

        result.unwrap_or_else(|reason| {
            tracing::warn!(event = kind, %reason, "dropping malformed push event");
            Vec::new()
        })
    }

    fn message_created(
        &self,
        created: MessageCreated,
        state: SyncState<'_>,
        received_at: DateTime<Utc>,
    ) -> Result<Vec<ClientAction>, MalformedRecord> {
        let chat_id = created.chat_id.map(|id| ChatId::new(id.to_string()));
        let chat_id = chat_id.ok_or(MalformedRecord::MissingChatId)?;
        let record = created.message.ok_or(MalformedRecord::MissingContent)?;
        let message = normalize::message(&record, state.directory.self_id(), received_at)?;

        let key = ConversationKey::Chat(chat_id.clone());

        if state.session.is_active(&chat_id) {
            state.store.append(&key, message);
            return Ok(Vec::new());
        }

        // Echo of our own send into a chat not on screen; the send's
        // confirmation reconciles it.
        if message.is_own {
            state.store.append(&key, message);
            return Ok(Vec::new());
        }

        let peer = message.sender_id.clone();
        state.directory.begin_refresh(true);
        let refresh = ClientAction::FetchContacts { silent: true };

        match self.policy {
            FocusPolicy::FollowMessage => {
                tracing::info!(%chat_id, %peer, "focus follows incoming message");
                state.store.adopt(&peer, &chat_id);
                state.session.focus(chat_id.clone(), peer.clone());
                state.store.append(&key, message);

                Ok(vec![
                    ClientAction::FetchMessages { chat_id: chat_id.clone() },
                    refresh,
                    ClientAction::Notify(Notice::FocusFollowed { chat_id, peer }),
                ])
            },
            FocusPolicy::Stay => {
                tracing::debug!(%chat_id, %peer, "message for background chat cached");
                state.store.append(&key, message);
                Ok(vec![refresh])
            },
        }
    }

    fn message_read(
        read: &MessageRead,
        state: SyncState<'_>,
    ) -> Result<Vec<ClientAction>, MalformedRecord> {
        let chat_id = read.chat_id.as_ref().map(|id| ChatId::new(id.to_string()));
        let chat_id = chat_id.ok_or(MalformedRecord::MissingChatId)?;

        let marked = state.store.mark_chat_read(&chat_id, state.session.active_chat());
        tracing::debug!(%chat_id, marked, "read receipt applied");
        Ok(Vec::new())
    }

    fn presence_changed(
        presence: &PresenceChanged,
        state: SyncState<'_>,
    ) -> Result<Vec<ClientAction>, MalformedRecord> {
        let user_id = presence.user_id.as_ref().map(|id| ContactId::new(id.to_string()));
        let user_id = user_id.ok_or(MalformedRecord::MissingUserId)?;

        state.directory.set_presence(&user_id, PresenceStatus::from_wire(presence.status.as_deref()));
        Ok(Vec::new())
    }
}
