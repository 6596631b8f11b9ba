//! Simulated world: one runtime wired to an in-memory backend.
//!
//! `SimWorld` spawns a real [`Runtime`] against a [`SimBackend`] and a
//! [`SimPush`], so scenarios exercise the production loop end to end. Must be
//! used on a current-thread tokio runtime with the clock paused; time only
//! moves when the world is idle.

use std::{fmt, ops::RangeInclusive, time::Duration};

use carelink_app::{Runtime, RuntimeError, RuntimeHandle, SyncConfig, SyncSnapshot};
use carelink_client::Client;
use carelink_core::{ChatId, ContactId, MessageId};
use carelink_proto::ContactRecord;
use tokio::task::JoinHandle;

use crate::{
    SimEnv,
    invariants::{InvariantRegistry, SystemSnapshot, Violation},
    sim_backend::SimBackend,
    sim_push::{self, PushControl},
};

/// Current user of a default world.
pub const SELF_ID: &str = "dr-okafor";

/// Failure of a simulated run.
#[derive(Debug)]
pub enum WorldError {
    /// The runtime exited or rejected a command.
    Runtime(RuntimeError),
    /// The runtime task panicked or was cancelled.
    Join(String),
    /// Invariants failed.
    Violations(Vec<Violation>),
}

impl fmt::Display for WorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Runtime(e) => write!(f, "runtime: {e}"),
            Self::Join(e) => write!(f, "runtime task: {e}"),
            Self::Violations(v) => {
                let messages: Vec<_> = v.iter().map(ToString::to_string).collect();
                write!(f, "invariant violation:\n  {}", messages.join("\n  "))
            },
        }
    }
}

impl std::error::Error for WorldError {}

impl From<RuntimeError> for WorldError {
    fn from(e: RuntimeError) -> Self {
        Self::Runtime(e)
    }
}

/// World configuration.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Seed for backend latency.
    pub seed: u64,
    /// Current user.
    pub self_id: ContactId,
    /// Server roster.
    pub contacts: Vec<ContactRecord>,
    /// Runtime configuration.
    pub sync: SyncConfig,
    /// Push link state at start.
    pub push_connected: bool,
    /// Per-request latency range, in milliseconds.
    pub latency_ms: RangeInclusive<u64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            self_id: ContactId::new(SELF_ID),
            contacts: vec![
                ContactRecord::new(SELF_ID, "Ada Okafor").with_role("physician"),
                ContactRecord::new("nurse-lee", "Min Lee").with_role("nurse").with_status("online"),
                ContactRecord::new("dr-silva", "Rui Silva").with_role("physician"),
                ContactRecord::new("tech-ward", "Sam Ward")
                    .with_role("technician")
                    .with_status("busy"),
            ],
            sync: SyncConfig::default(),
            push_connected: true,
            latency_ms: 0..=0,
        }
    }
}

/// Peers of the default roster.
pub fn default_peers() -> Vec<ContactId> {
    ["nurse-lee", "dr-silva", "tech-ward"].into_iter().map(ContactId::new).collect()
}

/// One simulated client session.
pub struct SimWorld {
    /// Shared environment.
    pub env: SimEnv,
    /// Server truth and request log.
    pub backend: SimBackend,
    /// Server side of the push link.
    pub push: PushControl,
    handle: RuntimeHandle,
    task: JoinHandle<Client<SimEnv>>,
    registry: InvariantRegistry,
    settle_for: Duration,
}

impl SimWorld {
    /// Start a world with the default configuration.
    pub fn start() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Start a world.
    pub fn with_config(config: WorldConfig) -> Self {
        let env = SimEnv::new();
        let (subscription, push) = sim_push::channel(config.push_connected);

        let backend = SimBackend::new(env, config.self_id.clone(), push.clone(), config.seed);
        backend.set_latency(config.latency_ms.clone());
        for record in config.contacts {
            backend.add_contact(record);
        }

        // Enough rounds for select, resolve and mark-read to chain
        let settle_for = Duration::from_millis((config.latency_ms.end() + 1) * 4);

        let (runtime, handle) =
            Runtime::new(env, backend.clone(), subscription, config.self_id, config.sync);
        let task = tokio::spawn(runtime.run());

        Self {
            env,
            backend,
            push,
            handle,
            task,
            registry: InvariantRegistry::standard(),
            settle_for,
        }
    }

    /// Command surface of the runtime.
    pub fn handle(&self) -> &RuntimeHandle {
        &self.handle
    }

    /// Mutable command surface, for receiving notices.
    pub fn handle_mut(&mut self) -> &mut RuntimeHandle {
        &mut self.handle
    }

    /// Let in-flight requests and their follow-ups complete.
    pub async fn settle(&self) {
        tokio::time::sleep(self.settle_for).await;
    }

    /// Advance virtual time.
    pub async fn advance(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Select a peer and wait for the chat to load.
    pub async fn open(&self, peer: &ContactId) -> Result<Option<ChatId>, WorldError> {
        self.handle.select(peer.clone()).await?;
        self.settle().await;
        Ok(self.handle.active().chat_id)
    }

    /// Type and send a message in the selected conversation.
    pub async fn send(&self, text: &str) -> Result<(), WorldError> {
        self.handle.compose(text).await?;
        self.handle.send().await?;
        Ok(())
    }

    /// Current sync state.
    pub async fn snapshot(&self) -> Result<SyncSnapshot, WorldError> {
        Ok(self.handle.snapshot().await?)
    }

    /// Ids of the conversation on screen.
    pub async fn visible_ids(&self) -> Result<Vec<MessageId>, WorldError> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.visible.into_iter().map(|m| m.id).collect())
    }

    /// Run the standard invariants against the live state.
    pub async fn check_invariants(&self) -> Result<SystemSnapshot, WorldError> {
        let snapshot = SystemSnapshot::from_sync(&self.snapshot().await?);
        self.registry.check_all(&snapshot).map_err(WorldError::Violations)?;
        Ok(snapshot)
    }

    /// Stop the runtime and return the final client state.
    pub async fn shutdown(self) -> Result<Client<SimEnv>, WorldError> {
        self.handle.shutdown().await?;
        self.task.await.map_err(|e| WorldError::Join(e.to_string()))
    }
}
