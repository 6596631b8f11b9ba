//! Fallback polling while the push channel is down.
//!
//! The poller is active only while the push channel is disconnected and a
//! chat is active. It never caches the chat id: every call takes the active
//! chat as read at that moment, so a chat switch while polling makes the next
//! poll fetch the new chat.
//!
//! ```text
//!            disconnected && active chat
//!  ┌────────┐ ─────────────────────────> ┌────────┐
//!  │  Idle  │                            │ Active │ ── every interval ──> fetch(active)
//!  └────────┘ <───────────────────────── └────────┘
//!            connected / reconnect / no chat
//! ```

use std::{ops::Sub, time::Duration};

use crate::{timer::IntervalTimer, types::ChatId};

/// Default period between fallback polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(8);

/// Decides when a fallback fetch of the active chat is due.
#[derive(Debug, Clone)]
pub struct FallbackPoller<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    timer: IntervalTimer<I>,
}

impl<I> FallbackPoller<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create an idle poller.
    pub fn new(interval: Duration) -> Self {
        Self { timer: IntervalTimer::new(interval) }
    }

    /// Periodic check.
    ///
    /// Connectivity is checked before anything else: a connected channel
    /// cancels the poller. Otherwise the poller activates (first poll one
    /// interval later) and returns the chat to fetch whenever a period has
    /// elapsed.
    pub fn tick(&mut self, now: I, connected: bool, active: Option<&ChatId>) -> Option<ChatId> {
        let Some(chat_id) = active.filter(|_| !connected) else {
            if self.timer.cancel() {
                tracing::debug!(connected, "fallback poller stopped");
            }
            return None;
        };

        if self.timer.arm(now) {
            tracing::info!(%chat_id, interval = ?self.timer.interval(), "fallback poller started");
            return None;
        }

        self.timer.poll(now).then(|| chat_id.clone())
    }

    /// Push channel dropped. Starts polling at once if a chat is active.
    pub fn on_disconnect(&mut self, now: I, active: Option<&ChatId>) {
        if active.is_some() && self.timer.arm(now) {
            tracing::info!(interval = ?self.timer.interval(), "push down, fallback poller started");
        }
    }

    /// Push channel came back.
    ///
    /// Clears the poller and returns the chat for the one catch-up fetch,
    /// issued whether or not the poller was running.
    pub fn on_reconnect(&mut self, active: Option<&ChatId>) -> Option<ChatId> {
        if self.timer.cancel() {
            tracing::debug!("push restored, fallback poller cleared");
        }
        active.cloned()
    }

    /// Stop polling (session teardown).
    pub fn cancel(&mut self) -> bool {
        self.timer.cancel()
    }

    /// Whether the poller is scheduled.
    pub fn is_active(&self) -> bool {
        self.timer.is_armed()
    }
}

impl<I> Default for FallbackPoller<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}
