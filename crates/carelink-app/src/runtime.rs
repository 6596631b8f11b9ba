//! Generic runtime for sync orchestration.
//!
//! The Runtime is the single owner of the [`Client`] state machine. It loops
//! over four sources and feeds each into the client:
//! - Commands from the UI shell ([`RuntimeHandle`])
//! - Signals from the [`PushChannel`]
//! - Completed REST requests (spawned into a [`JoinSet`])
//! - A housekeeping tick driving the client's timers
//!
//! Requests run concurrently and never block the loop or each other; their
//! results come back as client events in completion order.

use carelink_client::{ActiveChat, Client, ClientAction, ClientError, ClientEvent, Notice};
use carelink_core::{ContactDirectory, ContactId, Message, MessageStore, TempId, env::Environment};
use carelink_proto::{PushEvent, SendMessageRequest};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinSet,
};

use crate::{
    config::SyncConfig,
    error::RuntimeError,
    transport::{PushChannel, PushSignal, RestApi},
};

/// Reply channel for commands the client may reject.
type Reply = oneshot::Sender<Result<(), ClientError>>;

/// Commands from the UI shell.
#[derive(Debug)]
enum Command {
    Select { peer: ContactId, reply: Reply },
    Compose { text: String, reply: Reply },
    Send { reply: Reply },
    Snapshot { reply: oneshot::Sender<SyncSnapshot> },
    Shutdown,
}

/// Point-in-time copy of the sync state for rendering.
#[derive(Debug, Clone)]
pub struct SyncSnapshot {
    /// Active conversation.
    pub active: ActiveChat,
    /// Roster.
    pub directory: ContactDirectory,
    /// All cached conversations.
    pub store: MessageStore,
    /// Messages of the conversation on screen.
    pub visible: Vec<Message>,
    /// Compose draft of the selected conversation.
    pub draft: String,
    /// The selected conversation has a send awaiting the server.
    pub sending: bool,
    /// Temporary ids of every send awaiting the server.
    pub pending: Vec<TempId>,
    /// Push channel connectivity as last reported.
    pub push_connected: bool,
    /// The fallback poller is scheduled.
    pub polling: bool,
}

/// Generic runtime that drives the client against REST and push transports.
///
/// # Type Parameters
///
/// - `E`: Environment providing time
/// - `A`: REST collaborator
/// - `P`: Push channel subscription
pub struct Runtime<E, A, P>
where
    E: Environment,
    A: RestApi,
    P: PushChannel,
{
    env: E,
    api: A,
    push: P,
    client: Client<E>,
    config: SyncConfig,
    commands: mpsc::Receiver<Command>,
    notices: mpsc::UnboundedSender<Notice>,
    active: watch::Sender<ActiveChat>,
    requests: JoinSet<Option<ClientEvent<E::Instant>>>,
    push_open: bool,
}

impl<E, A, P> Runtime<E, A, P>
where
    E: Environment,
    A: RestApi,
    P: PushChannel,
{
    /// Create a runtime for the given user and its handle.
    pub fn new(
        env: E,
        api: A,
        push: P,
        self_id: ContactId,
        config: SyncConfig,
    ) -> (Self, RuntimeHandle) {
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (active_tx, active_rx) = watch::channel(ActiveChat::default());

        let client = Client::new(env.clone(), self_id, config.client_config());
        let runtime = Self {
            env,
            api,
            push,
            client,
            config,
            commands: command_rx,
            notices: notice_tx,
            active: active_tx,
            requests: JoinSet::new(),
            push_open: true,
        };
        let handle = RuntimeHandle { commands: command_tx, notices: notice_rx, active: active_rx };

        (runtime, handle)
    }

    /// Run the event loop until shutdown.
    ///
    /// Exits on [`RuntimeHandle::shutdown`] or once every handle is dropped.
    /// Returns the client so callers can inspect the final state.
    pub async fn run(mut self) -> Client<E> {
        tracing::info!(self_id = %self.client.self_id(), "sync runtime starting");
        self.dispatch(ClientEvent::Start);
        if self.push.is_connected() {
            self.dispatch(ClientEvent::PushConnected);
        }

        let mut last_tick = self.env.now();

        loop {
            let wait = self.config.tick_interval.saturating_sub(self.env.now() - last_tick);
            let tick = self.env.sleep(wait);

            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        tracing::debug!("all handles dropped");
                        break;
                    };
                    if !self.handle_command(command) {
                        break;
                    }
                },
                signal = self.push.next_signal(), if self.push_open => {
                    self.handle_push(signal);
                },
                Some(joined) = self.requests.join_next(), if !self.requests.is_empty() => {
                    match joined {
                        Ok(Some(event)) => self.dispatch(event),
                        Ok(None) => {},
                        Err(error) => tracing::warn!(%error, "request task failed"),
                    }
                },
                () = tick => {
                    last_tick = self.env.now();
                    self.dispatch(ClientEvent::Tick { now: last_tick });
                },
            }
        }

        self.dispatch(ClientEvent::Shutdown);
        self.requests.abort_all();
        tracing::info!("sync runtime stopped");
        self.client
    }

    /// Returns `false` if the loop should exit.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Select { peer, reply } => {
                self.dispatch_with_reply(ClientEvent::SelectContact { peer }, reply);
            },
            Command::Compose { text, reply } => {
                self.dispatch_with_reply(ClientEvent::ComposeChanged { text }, reply);
            },
            Command::Send { reply } => self.dispatch_with_reply(ClientEvent::Send, reply),
            Command::Snapshot { reply } => {
                // The caller may have given up waiting
                let _ = reply.send(self.snapshot());
            },
            Command::Shutdown => return false,
        }
        true
    }

    fn handle_push(&mut self, signal: Option<PushSignal>) {
        let event = match signal {
            Some(PushSignal::Connected) => ClientEvent::PushConnected,
            Some(PushSignal::Disconnected) => ClientEvent::PushDisconnected,
            Some(PushSignal::Reconnected) => ClientEvent::PushReconnected,
            Some(PushSignal::Event(event)) => ClientEvent::Push(event),
            Some(PushSignal::Frame(frame)) => match PushEvent::decode(&frame) {
                Ok(event) => ClientEvent::Push(event),
                Err(error) => {
                    tracing::warn!(%error, "dropping undecodable push frame");
                    return;
                },
            },
            None => {
                tracing::warn!("push channel closed, continuing on fallback polling");
                self.push_open = false;
                ClientEvent::PushDisconnected
            },
        };
        self.dispatch(event);
    }

    fn dispatch(&mut self, event: ClientEvent<E::Instant>) {
        match self.client.handle(event) {
            Ok(actions) => self.execute(actions),
            Err(error) => tracing::warn!(%error, "client rejected event"),
        }
        self.publish_active();
    }

    fn dispatch_with_reply(&mut self, event: ClientEvent<E::Instant>, reply: Reply) {
        let result = self.client.handle(event).map(|actions| self.execute(actions));
        self.publish_active();
        let _ = reply.send(result);
    }

    fn execute(&mut self, actions: Vec<ClientAction>) {
        for action in actions {
            match action {
                ClientAction::FetchContacts { silent } => {
                    let api = self.api.clone();
                    tracing::debug!(silent, "fetching contacts");
                    self.requests.spawn(async move {
                        let result = api.fetch_contacts().await;
                        Some(ClientEvent::ContactsFetched { silent, result })
                    });
                },
                ClientAction::ResolveChat { peer } => {
                    let api = self.api.clone();
                    self.requests.spawn(async move {
                        let result = api.fetch_chat_with(&peer).await;
                        Some(ClientEvent::ChatResolved { peer, result })
                    });
                },
                ClientAction::FetchMessages { chat_id } => {
                    let api = self.api.clone();
                    self.requests.spawn(async move {
                        let result = api.fetch_messages(&chat_id).await;
                        Some(ClientEvent::MessagesFetched { chat_id, result })
                    });
                },
                ClientAction::PostMessage { temp_id, peer, content } => {
                    let api = self.api.clone();
                    self.requests.spawn(async move {
                        let result = api.send_message(&peer, SendMessageRequest { content }).await;
                        Some(ClientEvent::MessagePosted { temp_id, result })
                    });
                },
                ClientAction::MarkChatRead { chat_id } => {
                    let api = self.api.clone();
                    self.requests.spawn(async move {
                        if let Err(error) = api.mark_chat_read(&chat_id).await {
                            tracing::debug!(%chat_id, %error, "mark-read failed, ignored");
                        }
                        None
                    });
                },
                ClientAction::Notify(notice) => {
                    if self.notices.send(notice).is_err() {
                        tracing::debug!("notice dropped, no listener");
                    }
                },
            }
        }
    }

    fn publish_active(&self) {
        let live = self.client.active();
        self.active.send_if_modified(|current| {
            if current == live {
                return false;
            }
            *current = live.clone();
            true
        });
    }

    fn snapshot(&self) -> SyncSnapshot {
        let active = self.client.active().clone();
        let peer = active.peer.clone();

        SyncSnapshot {
            directory: self.client.directory().clone(),
            store: self.client.store().clone(),
            visible: self.client.visible_messages().to_vec(),
            draft: peer.as_ref().map(|p| self.client.draft(p).to_string()).unwrap_or_default(),
            sending: peer.as_ref().is_some_and(|p| self.client.is_sending(p)),
            pending: self.client.pending_sends().map(|send| send.temp_id).collect(),
            push_connected: self.client.is_push_connected(),
            polling: self.client.is_polling(),
            active,
        }
    }
}

/// Command surface for the UI shell.
///
/// Dropping every handle stops the runtime.
#[derive(Debug)]
pub struct RuntimeHandle {
    commands: mpsc::Sender<Command>,
    notices: mpsc::UnboundedReceiver<Notice>,
    active: watch::Receiver<ActiveChat>,
}

impl RuntimeHandle {
    /// Select a contact.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Rejected` if the contact is the current user
    /// - `RuntimeError::Stopped` if the runtime has exited
    pub async fn select(&self, peer: ContactId) -> Result<(), RuntimeError> {
        self.request(|reply| Command::Select { peer, reply }).await
    }

    /// Replace the compose field of the selected conversation.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Rejected` if no conversation is selected
    /// - `RuntimeError::Stopped` if the runtime has exited
    pub async fn compose(&self, text: impl Into<String>) -> Result<(), RuntimeError> {
        let text = text.into();
        self.request(|reply| Command::Compose { text, reply }).await
    }

    /// Send the compose field of the selected conversation.
    ///
    /// A blank draft or a send already in flight makes this a no-op.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Rejected` if no conversation is selected
    /// - `RuntimeError::Stopped` if the runtime has exited
    pub async fn send(&self) -> Result<(), RuntimeError> {
        self.request(|reply| Command::Send { reply }).await
    }

    /// Copy of the current sync state.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Stopped` if the runtime has exited
    pub async fn snapshot(&self) -> Result<SyncSnapshot, RuntimeError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| RuntimeError::Stopped)?;
        response.await.map_err(|_| RuntimeError::Stopped)
    }

    /// Stop the runtime.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Stopped` if the runtime has already exited
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.commands.send(Command::Shutdown).await.map_err(|_| RuntimeError::Stopped)
    }

    /// Live active conversation.
    pub fn active(&self) -> ActiveChat {
        self.active.borrow().clone()
    }

    /// Subscription to active conversation changes.
    pub fn watch_active(&self) -> watch::Receiver<ActiveChat> {
        self.active.clone()
    }

    /// Next notice for the user. `None` once the runtime has exited.
    pub async fn next_notice(&mut self) -> Option<Notice> {
        self.notices.recv().await
    }

    /// Notice already delivered, without waiting.
    pub fn try_notice(&mut self) -> Option<Notice> {
        self.notices.try_recv().ok()
    }

    async fn request(&self, command: impl FnOnce(Reply) -> Command) -> Result<(), RuntimeError> {
        let (reply, response) = oneshot::channel();
        self.commands.send(command(reply)).await.map_err(|_| RuntimeError::Stopped)?;
        response.await.map_err(|_| RuntimeError::Stopped)?.map_err(RuntimeError::from)
    }
}
