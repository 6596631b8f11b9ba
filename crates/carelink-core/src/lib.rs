//! Carelink Core
//!
//! Sans-IO building blocks of the staff-portal messaging sync core. Nothing in
//! this crate performs I/O: time is passed in as a parameter (or obtained from
//! an [`env::Environment`]), fetch results are handed in by the caller, and
//! every component exposes plain methods that mutate in-memory state.
//!
//! # Components
//!
//! - [`ContactDirectory`]: normalized, sorted roster with presence updates
//! - [`MessageStore`]: per-conversation ordered, deduplicated message log
//! - [`FallbackPoller`]: decides when to pull messages while push is down
//! - [`IntervalTimer`]: cancellable interval used by the poller and the
//!   roster refresh
//! - [`normalize`]: turns heterogeneous wire records into domain types

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod directory;
pub mod env;
pub mod error;
pub mod normalize;
pub mod poller;
pub mod store;
pub mod timer;
pub mod types;

pub use directory::ContactDirectory;
pub use error::{ApiError, MalformedRecord};
pub use poller::FallbackPoller;
pub use store::{MessageStore, Reconciled};
pub use timer::IntervalTimer;
pub use types::{
    ChatId, Confirmation, Contact, ContactId, ConversationKey, Message, MessageId,
    PresenceStatus, TempId,
};
