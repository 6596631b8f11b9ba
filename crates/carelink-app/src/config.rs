//! Runtime configuration.

use std::time::Duration;

use carelink_client::{ClientConfig, DEFAULT_CONTACT_REFRESH_INTERVAL, FocusPolicy};
use carelink_core::poller::DEFAULT_POLL_INTERVAL;

/// Housekeeping tick driving the client's timers.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Capacity of the command channel from the UI shell.
pub const DEFAULT_COMMAND_BUFFER: usize = 64;

/// Sync runtime configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Fallback poll period while push is down
    pub poll_interval: Duration,
    /// Silent roster refresh period
    pub contact_refresh_interval: Duration,
    /// Housekeeping tick period (timer resolution)
    pub tick_interval: Duration,
    /// Reaction to messages for background chats
    pub focus_policy: FocusPolicy,
    /// Command channel capacity
    pub command_buffer: usize,
}

impl SyncConfig {
    /// Subset handed to the client state machine.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            poll_interval: self.poll_interval,
            contact_refresh_interval: self.contact_refresh_interval,
            focus_policy: self.focus_policy,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            contact_refresh_interval: DEFAULT_CONTACT_REFRESH_INTERVAL,
            tick_interval: DEFAULT_TICK_INTERVAL,
            focus_policy: FocusPolicy::default(),
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}
