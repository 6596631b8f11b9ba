//! In-memory messaging backend.
//!
//! `SimBackend` holds the server's truth (roster, chats, histories) and
//! answers the runtime's REST calls after a seeded, randomized latency. Server
//! side activity (peers writing, reading, changing presence) is injected
//! through its methods and fanned out over the attached [`PushControl`].
//!
//! Every REST call is logged as a [`Request`] when issued, so tests can
//! assert on what the client asked for and when.

use std::{
    collections::HashMap,
    ops::RangeInclusive,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use carelink_app::RestApi;
use carelink_core::{ApiError, ChatId, ContactId, env::Environment};
use carelink_proto::{
    ChatEnvelope, ContactRecord, MessageRecord, PushEvent, SendMessageRequest, SendReceipt,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{SimEnv, sim_push::PushControl};

/// REST call issued by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `GET` contacts.
    Contacts,
    /// `GET` chat-with-peer.
    ChatWith(ContactId),
    /// `GET` messages-for-chat.
    Messages(ChatId),
    /// `POST` send-message.
    Send {
        /// Recipient.
        peer: ContactId,
        /// Posted body.
        content: String,
    },
    /// `PATCH` mark-chat-read.
    MarkRead(ChatId),
}

struct ServerState {
    env: SimEnv,
    self_id: ContactId,
    push: PushControl,
    rng: ChaCha8Rng,
    contacts: Vec<ContactRecord>,
    chats: HashMap<ContactId, ChatId>,
    history: HashMap<ChatId, Vec<MessageRecord>>,
    next_chat: u64,
    next_message: u64,
    latency: RangeInclusive<u64>,
    slow_peers: HashMap<ContactId, Duration>,
    failing_sends: u32,
    failing_fetches: u32,
    echo_sends: bool,
    requests: Vec<Request>,
}

impl ServerState {
    fn chat_with(&mut self, peer: &ContactId) -> ChatId {
        if let Some(chat) = self.chats.get(peer) {
            return chat.clone();
        }

        self.next_chat += 1;
        let chat = ChatId::new(format!("chat-{}", self.next_chat));
        self.chats.insert(peer.clone(), chat.clone());
        self.history.insert(chat.clone(), Vec::new());
        chat
    }

    fn peer_of(&self, chat: &ChatId) -> Option<&ContactId> {
        self.chats.iter().find(|(_, c)| *c == chat).map(|(peer, _)| peer)
    }

    /// Store a new message and return its record.
    fn post(&mut self, chat: &ChatId, sender: &ContactId, content: String) -> MessageRecord {
        self.next_message += 1;
        let id = format!("msg-{}", self.next_message);
        let record = MessageRecord::new(id, sender.as_str(), content)
            .with_timestamp(self.env.wall_clock().to_rfc3339())
            .with_read(false);

        self.history.entry(chat.clone()).or_default().push(record.clone());
        record
    }

    fn sample_latency(&mut self) -> Duration {
        Duration::from_millis(self.rng.gen_range(self.latency.clone()))
    }

    fn take_fetch_failure(&mut self) -> Option<ApiError> {
        if self.failing_fetches == 0 {
            return None;
        }
        self.failing_fetches -= 1;
        Some(ApiError::Transport("connection reset".into()))
    }
}

/// In-memory REST backend with push fan-out.
///
/// Clones share the same server.
#[derive(Clone)]
pub struct SimBackend {
    state: Arc<Mutex<ServerState>>,
}

impl SimBackend {
    /// Create a backend serving `self_id`, publishing over `push`.
    ///
    /// Latency defaults to zero; requests still complete asynchronously.
    pub fn new(env: SimEnv, self_id: ContactId, push: PushControl, seed: u64) -> Self {
        let state = ServerState {
            env,
            self_id,
            push,
            rng: ChaCha8Rng::seed_from_u64(seed),
            contacts: Vec::new(),
            chats: HashMap::new(),
            history: HashMap::new(),
            next_chat: 0,
            next_message: 0,
            latency: 0..=0,
            slow_peers: HashMap::new(),
            failing_sends: 0,
            failing_fetches: 0,
            echo_sends: true,
            requests: Vec::new(),
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ServerState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    async fn respond<R>(
        &self,
        request: Request,
        extra: Duration,
        f: impl FnOnce(&mut ServerState) -> R,
    ) -> R {
        let latency = self.with_state(|s| {
            s.requests.push(request);
            s.sample_latency()
        });

        let delay = latency + extra;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.with_state(f)
    }

    /// Add a contact to the roster.
    pub fn add_contact(&self, record: ContactRecord) {
        self.with_state(|s| s.contacts.push(record));
    }

    /// Per-request latency range, in milliseconds.
    pub fn set_latency(&self, millis: RangeInclusive<u64>) {
        self.with_state(|s| s.latency = millis);
    }

    /// Extra delay on chat resolution with one peer.
    pub fn slow_down(&self, peer: &ContactId, extra: Duration) {
        self.with_state(|s| s.slow_peers.insert(peer.clone(), extra));
    }

    /// Fail the next `count` sends.
    pub fn fail_sends(&self, count: u32) {
        self.with_state(|s| s.failing_sends = count);
    }

    /// Fail the next `count` contact and message fetches.
    pub fn fail_fetches(&self, count: u32) {
        self.with_state(|s| s.failing_fetches = count);
    }

    /// Whether accepted sends are echoed back over push.
    pub fn set_echo(&self, echo: bool) {
        self.with_state(|s| s.echo_sends = echo);
    }

    /// Chat between the current user and `peer`, created if needed.
    pub fn open_chat(&self, peer: &ContactId) -> ChatId {
        self.with_state(|s| s.chat_with(peer))
    }

    /// `peer` writes to the current user.
    ///
    /// Returns the chat and the new message id. The push event is lost if the
    /// link is down.
    pub fn peer_writes(&self, peer: &ContactId, content: impl Into<String>) -> (ChatId, String) {
        let (chat, record, push) = self.with_state(|s| {
            let chat = s.chat_with(peer);
            let record = s.post(&chat, peer, content.into());
            (chat, record, s.push.clone())
        });

        let id = record.resolved_id().unwrap_or_default();
        push.publish(PushEvent::message_created(chat.as_str(), record));
        (chat, id)
    }

    /// `peer` reads everything the current user sent in their chat.
    pub fn peer_reads(&self, peer: &ContactId) {
        let (chat, push) = self.with_state(|s| {
            let chat = s.chat_with(peer);
            let own = s.self_id.clone();
            for record in s.history.entry(chat.clone()).or_default() {
                if record.resolved_sender().as_deref() == Some(own.as_str()) {
                    record.read = Some(true);
                }
            }
            (chat, s.push.clone())
        });
        push.publish(PushEvent::message_read(chat.as_str()));
    }

    /// `peer` changes presence.
    pub fn set_presence(&self, peer: &ContactId, status: &str) {
        let push = self.with_state(|s| {
            for record in &mut s.contacts {
                if record.resolved_id().as_deref() == Some(peer.as_str()) {
                    record.status = Some(status.to_string());
                }
            }
            s.push.clone()
        });
        push.publish(PushEvent::presence_changed(peer.as_str(), status));
    }

    /// Server-side history of a chat.
    pub fn history(&self, chat: &ChatId) -> Vec<MessageRecord> {
        self.with_state(|s| s.history.get(chat).cloned().unwrap_or_default())
    }

    /// Server ids of a chat, oldest first.
    pub fn message_ids(&self, chat: &ChatId) -> Vec<String> {
        self.history(chat).iter().filter_map(MessageRecord::resolved_id).collect()
    }

    /// Chat already open with `peer`.
    pub fn chat_for(&self, peer: &ContactId) -> Option<ChatId> {
        self.with_state(|s| s.chats.get(peer).cloned())
    }

    /// Every request issued so far.
    pub fn requests(&self) -> Vec<Request> {
        self.with_state(|s| s.requests.clone())
    }

    /// Message fetches issued for a chat.
    pub fn fetches(&self, chat: &ChatId) -> usize {
        self.with_state(|s| {
            s.requests.iter().filter(|r| matches!(r, Request::Messages(c) if c == chat)).count()
        })
    }

    /// Forget the request log.
    pub fn clear_requests(&self) {
        self.with_state(|s| s.requests.clear());
    }
}

impl RestApi for SimBackend {
    fn fetch_contacts(&self) -> impl Future<Output = Result<Vec<ContactRecord>, ApiError>> + Send {
        let backend = self.clone();
        async move {
            backend
                .respond(Request::Contacts, Duration::ZERO, |s| match s.take_fetch_failure() {
                    Some(error) => Err(error),
                    None => Ok(s.contacts.clone()),
                })
                .await
        }
    }

    fn fetch_chat_with(
        &self,
        peer: &ContactId,
    ) -> impl Future<Output = Result<ChatEnvelope, ApiError>> + Send {
        let backend = self.clone();
        let peer = peer.clone();
        async move {
            let extra =
                backend.with_state(|s| s.slow_peers.get(&peer).copied().unwrap_or_default());
            backend
                .respond(Request::ChatWith(peer.clone()), extra, |s| {
                    if peer == s.self_id {
                        return Err(ApiError::Status { code: 400 });
                    }
                    let chat = s.chat_with(&peer);
                    let history = s.history.get(&chat).cloned().unwrap_or_default();
                    Ok(ChatEnvelope::new(chat.as_str(), history))
                })
                .await
        }
    }

    fn fetch_messages(
        &self,
        chat_id: &ChatId,
    ) -> impl Future<Output = Result<Vec<MessageRecord>, ApiError>> + Send {
        let backend = self.clone();
        let chat = chat_id.clone();
        async move {
            backend
                .respond(Request::Messages(chat.clone()), Duration::ZERO, |s| {
                    match s.take_fetch_failure() {
                        Some(error) => Err(error),
                        None => s.history.get(&chat).cloned().ok_or(ApiError::Status { code: 404 }),
                    }
                })
                .await
        }
    }

    fn send_message(
        &self,
        peer: &ContactId,
        request: SendMessageRequest,
    ) -> impl Future<Output = Result<SendReceipt, ApiError>> + Send {
        let backend = self.clone();
        let peer = peer.clone();
        async move {
            let logged = Request::Send { peer: peer.clone(), content: request.content.clone() };
            let outcome = backend
                .respond(logged, Duration::ZERO, |s| {
                    if s.failing_sends > 0 {
                        s.failing_sends -= 1;
                        return Err(ApiError::Status { code: 503 });
                    }

                    let chat = s.chat_with(&peer);
                    let own = s.self_id.clone();
                    let record = s.post(&chat, &own, request.content);
                    let echo = s.echo_sends.then(|| s.push.clone());
                    Ok((chat, record, echo))
                })
                .await;

            let (chat, record, echo) = match outcome {
                Ok(accepted) => accepted,
                Err(error) => return Err(error),
            };
            let id = record.resolved_id().unwrap_or_default();
            let timestamp = record.timestamp.clone().unwrap_or_default();
            if let Some(push) = echo {
                push.publish(PushEvent::message_created(chat.as_str(), record));
            }
            Ok(SendReceipt::new(chat.as_str(), id, timestamp))
        }
    }

    fn mark_chat_read(&self, chat_id: &ChatId) -> impl Future<Output = Result<(), ApiError>> + Send {
        let backend = self.clone();
        let chat = chat_id.clone();
        async move {
            backend
                .respond(Request::MarkRead(chat.clone()), Duration::ZERO, |s| {
                    let Some(peer) = s.peer_of(&chat).cloned() else {
                        return Err(ApiError::Status { code: 404 });
                    };
                    for record in s.history.entry(chat).or_default() {
                        if record.resolved_sender().as_deref() == Some(peer.as_str()) {
                            record.read = Some(true);
                        }
                    }
                    Ok(())
                })
                .await
        }
    }
}
