//! Seeded chaos runs.
//!
//! A run drives a [`SimWorld`] through a random mix of user actions, peer
//! traffic, link flaps, injected failures and clock jumps, checking the
//! standard invariants after every step. After the last step the world is
//! brought to quiescence (link up, failures cleared, one reconnect catch-up)
//! and the active chat is compared with the server's history.

use std::{collections::BTreeSet, time::Duration};

use carelink_app::{RuntimeError, SyncConfig};
use carelink_client::FocusPolicy;
use carelink_core::{ConversationKey, MessageId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::world::{SimWorld, WorldConfig, WorldError, default_peers};

/// Phrases users and peers type.
const PHRASES: &[&str] = &[
    "BP 120/80, stable",
    "Can you check bed 4?",
    "On my way",
    "Labs are back",
    "Patient discharged",
    "Need a second opinion",
    "ok",
];

/// Chaos run parameters.
#[derive(Debug, Clone)]
pub struct ChaosConfig {
    /// Seed for the action schedule and backend latency.
    pub seed: u64,
    /// Number of random steps.
    pub steps: usize,
    /// Chance, in percent, that a step arms a send or fetch failure.
    pub failure_percent: u32,
    /// Upper bound of per-request latency, in milliseconds.
    pub max_latency_ms: u64,
    /// Reaction to messages for background chats.
    pub focus_policy: FocusPolicy,
    /// Fallback poll period.
    pub poll_interval: Duration,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            steps: 200,
            failure_percent: 10,
            max_latency_ms: 400,
            focus_policy: FocusPolicy::default(),
            poll_interval: SyncConfig::default().poll_interval,
        }
    }
}

/// Outcome of a chaos run.
#[derive(Debug, Clone, Default)]
pub struct ChaosReport {
    /// Steps executed.
    pub steps: usize,
    /// Sends issued by the user.
    pub sends: usize,
    /// Messages written by peers.
    pub peer_messages: usize,
    /// Link drops.
    pub disconnects: usize,
    /// Push events lost while the link was down.
    pub lost_events: u64,
    /// Fallback and catch-up fetches issued.
    pub fetches: usize,
    /// Server ids of the active chat missing on the client after quiescence.
    pub missing: Vec<String>,
    /// Ids on the client that the server does not have after quiescence.
    pub unexpected: Vec<String>,
}

impl ChaosReport {
    /// Whether the active chat matches the server after quiescence.
    pub fn converged(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

/// Execute one seeded run.
///
/// # Errors
///
/// - `WorldError::Violations` on the first step that breaks an invariant
/// - `WorldError::Runtime` if the runtime stops unexpectedly
pub async fn run(config: &ChaosConfig) -> Result<ChaosReport, WorldError> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let sync = SyncConfig {
        poll_interval: config.poll_interval,
        focus_policy: config.focus_policy,
        ..SyncConfig::default()
    };
    let world = SimWorld::with_config(WorldConfig {
        seed: config.seed.wrapping_mul(0x9E37_79B9_7F4A_7C15),
        sync,
        latency_ms: 0..=config.max_latency_ms,
        ..WorldConfig::default()
    });

    let peers = default_peers();
    let mut report = ChaosReport::default();
    world.settle().await;

    for step in 0..config.steps {
        let peer = pick(&mut rng, &peers).clone();
        match rng.gen_range(0..100u32) {
            0..=19 => {
                world.backend.peer_writes(&peer, *pick(&mut rng, PHRASES));
                report.peer_messages += 1;
            },
            20..=34 => accept_rejection(world.handle().select(peer).await)?,
            35..=54 => {
                accept_rejection(world.handle().compose(*pick(&mut rng, PHRASES)).await)?;
                accept_rejection(world.handle().send().await)?;
                report.sends += 1;
            },
            55..=61 => {
                if world.push.is_connected() {
                    report.disconnects += 1;
                }
                world.push.disconnect();
            },
            62..=69 => world.push.reconnect(),
            70..=74 => world.backend.peer_reads(&peer),
            75..=79 => {
                let status = *pick(&mut rng, &["online", "busy", "offline"]);
                world.backend.set_presence(&peer, status);
            },
            _ => world.advance(Duration::from_millis(rng.gen_range(0..=3_000))).await,
        }

        if rng.gen_range(0..100) < config.failure_percent {
            if rng.gen_bool(0.5) {
                world.backend.fail_sends(1);
            } else {
                world.backend.fail_fetches(1);
            }
        }

        world.check_invariants().await.inspect_err(|e| {
            tracing::error!(seed = config.seed, step, error = %e, "invariant violated");
        })?;
        report.steps += 1;
    }

    quiesce(&world, config.max_latency_ms).await;
    world.check_invariants().await?;
    compare_with_server(&world, &mut report).await?;

    report.lost_events = world.push.dropped();
    report.fetches = world
        .backend
        .requests()
        .iter()
        .filter(|r| matches!(r, crate::Request::Messages(_)))
        .count();

    world.shutdown().await?;
    Ok(report)
}

/// Bring the world to rest: no failures armed, link up, nothing in flight,
/// and one catch-up fetch of the active chat.
async fn quiesce(world: &SimWorld, max_latency_ms: u64) {
    // Chained requests (resolve, then fetch) need a few round trips
    let rest = Duration::from_millis(max_latency_ms.saturating_mul(4)).max(Duration::from_secs(5));

    world.backend.fail_sends(0);
    world.backend.fail_fetches(0);
    world.push.reconnect();
    world.advance(rest).await;

    world.push.disconnect();
    world.push.reconnect();
    world.advance(rest).await;
}

async fn compare_with_server(world: &SimWorld, report: &mut ChaosReport) -> Result<(), WorldError> {
    let snapshot = world.snapshot().await?;
    let Some(chat_id) = snapshot.active.chat_id else {
        return Ok(());
    };

    let server: BTreeSet<String> = world.backend.message_ids(&chat_id).into_iter().collect();
    let client: BTreeSet<String> = snapshot
        .store
        .messages(&ConversationKey::Chat(chat_id))
        .iter()
        .map(|m| match &m.id {
            MessageId::Server(id) => id.clone(),
            MessageId::Local(temp_id) => format!("local:{temp_id}"),
        })
        .collect();

    report.missing = server.difference(&client).cloned().collect();
    report.unexpected = client.difference(&server).cloned().collect();
    Ok(())
}

/// Commands the client refuses (nothing selected) are part of the chaos.
fn accept_rejection(result: Result<(), RuntimeError>) -> Result<(), WorldError> {
    match result {
        Ok(()) | Err(RuntimeError::Rejected(_)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn pick<'a, T>(rng: &mut ChaCha8Rng, items: &'a [T]) -> &'a T {
    &items[rng.gen_range(0..items.len())]
}
