//! Client state machine.
//!
//! The `Client` owns every piece of sync state (roster, message log, active
//! chat, send coordinators, timers) and is mutated only through
//! [`Client::handle`]. It performs no I/O: REST calls leave as
//! [`ClientAction`]s and their results come back as [`ClientEvent`]s, in
//! whatever order the network delivers them.

use std::collections::HashMap;

use carelink_core::{
    ApiError, ChatId, ContactDirectory, ContactId, ConversationKey, FallbackPoller, IntervalTimer,
    Message, MessageId, MessageStore, Reconciled, TempId, env::Environment, normalize,
};
use carelink_proto::{ChatEnvelope, ContactRecord, MessageRecord, PushEvent, SendReceipt};
use chrono::{DateTime, Utc};

use crate::{
    bridge::{PushEventBridge, SyncState},
    config::ClientConfig,
    error::ClientError,
    event::{ClientAction, ClientEvent, Notice},
    send::{InFlight, SendCoordinator},
    session::{ActiveChat, ConversationSession, Resolution},
};

/// Sync client for one logged-in user.
pub struct Client<E: Environment> {
    /// Environment for wall clock and monotonic time.
    env: E,

    /// Roster.
    directory: ContactDirectory,

    /// Message log.
    store: MessageStore,

    /// Active chat owner.
    session: ConversationSession,

    /// Send coordinators, one per conversation.
    senders: HashMap<ContactId, SendCoordinator>,

    /// Push event translation.
    bridge: PushEventBridge,

    /// Polling fallback while push is down.
    poller: FallbackPoller<E::Instant>,

    /// Silent roster refresh.
    roster_refresh: IntervalTimer<E::Instant>,

    /// Last connectivity reported by the push channel.
    push_connected: bool,

    /// Sequence number for temporary ids.
    next_temp_seq: u64,

    /// Session torn down; timers stay cancelled.
    shut_down: bool,
}

impl<E: Environment> Client<E> {
    /// Create a client for the given user.
    pub fn new(env: E, self_id: ContactId, config: ClientConfig) -> Self {
        Self {
            env,
            directory: ContactDirectory::new(self_id),
            store: MessageStore::new(),
            session: ConversationSession::new(),
            senders: HashMap::new(),
            bridge: PushEventBridge::new(config.focus_policy),
            poller: FallbackPoller::new(config.poll_interval),
            roster_refresh: IntervalTimer::new(config.contact_refresh_interval),
            push_connected: false,
            next_temp_seq: 0,
            shut_down: false,
        }
    }

    /// Current user's id.
    pub fn self_id(&self) -> &ContactId {
        self.directory.self_id()
    }

    /// Roster.
    pub fn directory(&self) -> &ContactDirectory {
        &self.directory
    }

    /// Message log.
    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Active chat owner.
    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    /// Live active conversation.
    pub fn active(&self) -> &ActiveChat {
        self.session.active()
    }

    /// Live active chat id.
    pub fn active_chat(&self) -> Option<&ChatId> {
        self.session.active_chat()
    }

    /// Messages of the conversation on screen.
    pub fn visible_messages(&self) -> &[Message] {
        self.session.view_key().map(|key| self.store.messages(&key)).unwrap_or_default()
    }

    /// Compose draft of a conversation.
    pub fn draft(&self, peer: &ContactId) -> &str {
        self.senders.get(peer).map_or("", SendCoordinator::draft)
    }

    /// Whether a conversation has a send awaiting the server.
    pub fn is_sending(&self, peer: &ContactId) -> bool {
        self.senders.get(peer).is_some_and(|s| s.in_flight().is_some())
    }

    /// Sends awaiting the server, across all conversations.
    pub fn pending_sends(&self) -> impl Iterator<Item = &InFlight> {
        self.senders.values().filter_map(SendCoordinator::in_flight)
    }

    /// Whether the push channel is connected.
    pub fn is_push_connected(&self) -> bool {
        self.push_connected
    }

    /// Whether the fallback poller is scheduled.
    pub fn is_polling(&self) -> bool {
        self.poller.is_active()
    }

    /// Whether the roster refresh timer is armed.
    pub fn is_refreshing_roster(&self) -> bool {
        self.roster_refresh.is_armed()
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// - `ClientError::SelfSelected` if the user selects themself
    /// - `ClientError::NoConversation` if compose or send arrive with nothing
    ///   selected
    pub fn handle(
        &mut self,
        event: ClientEvent<E::Instant>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        match event {
            ClientEvent::Start => Ok(self.handle_start()),
            ClientEvent::Tick { now } => Ok(self.handle_tick(now)),
            ClientEvent::SelectContact { peer } => self.handle_select(peer),
            ClientEvent::ComposeChanged { text } => self.handle_compose(text),
            ClientEvent::Send => self.handle_send(),
            ClientEvent::ContactsFetched { silent, result } => {
                Ok(self.handle_contacts(silent, result))
            },
            ClientEvent::ChatResolved { peer, result } => {
                Ok(self.handle_chat_resolved(peer, result))
            },
            ClientEvent::MessagesFetched { chat_id, result } => {
                Ok(self.handle_messages_fetched(&chat_id, result))
            },
            ClientEvent::MessagePosted { temp_id, result } => {
                Ok(self.handle_message_posted(temp_id, result))
            },
            ClientEvent::Push(event) => Ok(self.handle_push(event)),
            ClientEvent::PushConnected => Ok(self.handle_push_connected()),
            ClientEvent::PushDisconnected => Ok(self.handle_push_disconnected()),
            ClientEvent::PushReconnected => Ok(self.handle_push_reconnected()),
            ClientEvent::Shutdown => Ok(self.handle_shutdown()),
        }
    }

    fn handle_start(&mut self) -> Vec<ClientAction> {
        self.roster_refresh.arm(self.env.now());
        self.directory.begin_refresh(false);
        vec![ClientAction::FetchContacts { silent: false }]
    }

    fn handle_tick(&mut self, now: E::Instant) -> Vec<ClientAction> {
        let mut actions = Vec::new();
        if self.shut_down {
            return actions;
        }

        if self.roster_refresh.poll(now) {
            self.directory.begin_refresh(true);
            actions.push(ClientAction::FetchContacts { silent: true });
        }

        if let Some(chat_id) = self.poller.tick(now, self.push_connected, self.session.active_chat())
        {
            tracing::debug!(%chat_id, "fallback poll");
            actions.push(ClientAction::FetchMessages { chat_id });
        }

        actions
    }

    fn handle_select(&mut self, peer: ContactId) -> Result<Vec<ClientAction>, ClientError> {
        if &peer == self.directory.self_id() {
            return Err(ClientError::SelfSelected);
        }

        let cached = self.session.select(peer.clone());
        tracing::debug!(%peer, cached, "contact selected");
        Ok(vec![ClientAction::ResolveChat { peer }])
    }

    fn handle_compose(&mut self, text: String) -> Result<Vec<ClientAction>, ClientError> {
        let peer = self.session.selected_peer().cloned().ok_or(ClientError::NoConversation)?;
        self.sender(&peer).compose(text);
        Ok(Vec::new())
    }

    fn handle_send(&mut self) -> Result<Vec<ClientAction>, ClientError> {
        let peer = self.session.selected_peer().cloned().ok_or(ClientError::NoConversation)?;

        let temp_id = TempId::new(self.env.wall_clock_millis(), self.next_temp_seq);
        let sent_at = self.env.wall_clock();
        let own_id = self.directory.self_id().clone();

        let Some(outgoing) = self.sender(&peer).begin(&own_id, temp_id, sent_at) else {
            return Ok(Vec::new());
        };
        self.next_temp_seq += 1;

        let key = self.session.key_for(&peer);
        tracing::debug!(%peer, %temp_id, %key, "optimistic send");
        self.store.append(&key, outgoing.message);

        Ok(vec![ClientAction::PostMessage { temp_id, peer, content: outgoing.content }])
    }

    fn handle_contacts(
        &mut self,
        silent: bool,
        result: Result<Vec<ContactRecord>, ApiError>,
    ) -> Vec<ClientAction> {
        let count = self.directory.apply_roster(silent, result);
        tracing::debug!(count, "roster applied");
        Vec::new()
    }

    fn handle_chat_resolved(
        &mut self,
        peer: ContactId,
        result: Result<ChatEnvelope, ApiError>,
    ) -> Vec<ClientAction> {
        let envelope = match result {
            Ok(envelope) => envelope,
            Err(error) => {
                tracing::warn!(%peer, %error, "chat resolution failed");
                return Vec::new();
            },
        };

        let Some(chat_id) = envelope.resolved_chat_id().map(ChatId::new) else {
            tracing::warn!(%peer, "chat resolution without chat id dropped");
            return Vec::new();
        };

        let resolution = self.session.resolve(&peer, chat_id.clone());
        // Unconfirmed sends to the peer land after the server's history
        self.replace_history(&chat_id, &envelope.messages);
        self.store.adopt(&peer, &chat_id);

        match resolution {
            Resolution::Activated => vec![ClientAction::MarkChatRead { chat_id }],
            Resolution::Stale => Vec::new(),
        }
    }

    fn handle_messages_fetched(
        &mut self,
        chat_id: &ChatId,
        result: Result<Vec<MessageRecord>, ApiError>,
    ) -> Vec<ClientAction> {
        match result {
            Ok(records) => self.replace_history(chat_id, &records),
            Err(error) => tracing::warn!(%chat_id, %error, "message fetch failed, keeping cache"),
        }
        Vec::new()
    }

    fn handle_message_posted(
        &mut self,
        temp_id: TempId,
        result: Result<SendReceipt, ApiError>,
    ) -> Vec<ClientAction> {
        let Some(peer) = self.senders.values().find(|s| s.owns(temp_id)).map(|s| s.peer().clone())
        else {
            tracing::warn!(%temp_id, "receipt for unknown send ignored");
            return Vec::new();
        };

        let confirmed = result
            .map_err(|e| e.to_string())
            .and_then(|receipt| {
                normalize::confirmation(&receipt, self.env.wall_clock()).map_err(|e| e.to_string())
            });

        match confirmed {
            Ok((chat_id, confirmation)) => {
                let Some(in_flight) = self.sender(&peer).confirm(temp_id) else {
                    return Vec::new();
                };

                if let Some(chat_id) = chat_id {
                    self.adopt_chat(&peer, chat_id);
                }

                let key = self.session.key_for(&peer);
                match self.store.replace(&key, temp_id, &confirmation) {
                    Reconciled::Replaced | Reconciled::ReplacedDroppingEcho => {},
                    Reconciled::AlreadyPresent => {
                        tracing::debug!(%temp_id, id = %confirmation.id, "confirmed after resync");
                    },
                    Reconciled::Missing => {
                        let message = self.confirmed_message(
                            &in_flight,
                            &confirmation.id,
                            confirmation.timestamp,
                        );
                        self.store.append(&key, message);
                    },
                }

                tracing::debug!(%peer, %temp_id, id = %confirmation.id, "send confirmed");
                Vec::new()
            },
            Err(reason) => self.roll_back(&peer, temp_id, reason),
        }
    }

    fn handle_push(&mut self, event: PushEvent) -> Vec<ClientAction> {
        let received_at = self.env.wall_clock();
        let state = SyncState {
            directory: &mut self.directory,
            store: &mut self.store,
            session: &mut self.session,
        };
        self.bridge.apply(event, state, received_at)
    }

    fn handle_push_connected(&mut self) -> Vec<ClientAction> {
        self.push_connected = true;
        self.poller.cancel();
        Vec::new()
    }

    fn handle_push_disconnected(&mut self) -> Vec<ClientAction> {
        self.push_connected = false;
        self.poller.on_disconnect(self.env.now(), self.session.active_chat());
        Vec::new()
    }

    fn handle_push_reconnected(&mut self) -> Vec<ClientAction> {
        self.push_connected = true;
        self.poller
            .on_reconnect(self.session.active_chat())
            .map(|chat_id| vec![ClientAction::FetchMessages { chat_id }])
            .unwrap_or_default()
    }

    fn handle_shutdown(&mut self) -> Vec<ClientAction> {
        self.shut_down = true;
        self.poller.cancel();
        self.roster_refresh.cancel();
        tracing::debug!("sync client shut down");
        Vec::new()
    }

    /// Coordinator of a conversation, created on first use.
    fn sender(&mut self, peer: &ContactId) -> &mut SendCoordinator {
        self.senders.entry(peer.clone()).or_insert_with(|| SendCoordinator::new(peer.clone()))
    }

    /// Install a fetched list as the server's truth for a chat.
    fn replace_history(&mut self, chat_id: &ChatId, records: &[MessageRecord]) {
        let messages = normalize::messages(records, self.directory.self_id(), self.env.wall_clock());
        tracing::debug!(%chat_id, count = messages.len(), "history replaced");
        self.store.replace_all(&ConversationKey::Chat(chat_id.clone()), messages);
    }

    /// Adopt the chat id a send receipt carried.
    fn adopt_chat(&mut self, peer: &ContactId, chat_id: ChatId) {
        if self.session.chat_for(peer) != Some(&chat_id) {
            let resolution = self.session.resolve(peer, chat_id.clone());
            tracing::debug!(%peer, %chat_id, ?resolution, "chat adopted from send receipt");
        }
        self.store.adopt(peer, &chat_id);
    }

    fn confirmed_message(
        &self,
        in_flight: &InFlight,
        id: &str,
        timestamp: DateTime<Utc>,
    ) -> Message {
        Message {
            id: MessageId::server(id),
            sender_id: self.directory.self_id().clone(),
            text: in_flight.content.clone(),
            timestamp,
            is_own: true,
            read: false,
        }
    }

    fn roll_back(
        &mut self,
        peer: &ContactId,
        temp_id: TempId,
        reason: String,
    ) -> Vec<ClientAction> {
        let Some(failed) = self.sender(peer).fail(temp_id) else {
            return Vec::new();
        };

        let local_id = MessageId::Local(temp_id);
        let key = self.session.key_for(peer);
        if self.store.remove(&key, &local_id).is_none() {
            self.store.remove(&ConversationKey::Peer(peer.clone()), &local_id);
        }

        tracing::warn!(%peer, %temp_id, %reason, "send failed, rolled back");
        vec![ClientAction::Notify(Notice::SendFailed {
            peer: peer.clone(),
            text: failed.original,
            reason,
        })]
    }
}
