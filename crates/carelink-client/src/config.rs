//! Client configuration.

use std::time::Duration;

use carelink_core::poller::DEFAULT_POLL_INTERVAL;

/// Interval of the silent roster refresh.
pub const DEFAULT_CONTACT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// What happens when a message arrives for a chat other than the active one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusPolicy {
    /// Switch the active conversation to the message's chat.
    #[default]
    FollowMessage,
    /// Keep the active conversation; the message is only cached.
    Stay,
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Fallback poll period while push is down
    pub poll_interval: Duration,
    /// Silent roster refresh period
    pub contact_refresh_interval: Duration,
    /// Reaction to messages for background chats
    pub focus_policy: FocusPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            contact_refresh_interval: DEFAULT_CONTACT_REFRESH_INTERVAL,
            focus_policy: FocusPolicy::default(),
        }
    }
}
