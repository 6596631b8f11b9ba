//! Client
//!
//! Action-based sync state machine for the staff messaging client. Presents
//! one consistent, deduplicated view per conversation while history fetches,
//! push events, fallback polls and optimistic sends race each other.
//!
//! # Architecture
//!
//! The client follows the same Sans-IO and Action-Based patterns as
//! [`carelink_core`]. It receives events ([`ClientEvent`]), processes them
//! through pure state machine logic, and returns actions ([`ClientAction`]) for
//! the caller to execute.
//!
//! # Components
//!
//! - [`Client`]: Top-level state machine owning all sync state
//! - [`ConversationSession`]: Active chat cell and peer/chat mapping
//! - [`SendCoordinator`]: Per-conversation draft and optimistic send
//! - [`PushEventBridge`]: Applies push events to the sync state

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod bridge;
mod client;
mod config;
mod error;
mod event;
mod send;
mod session;

pub use bridge::{PushEventBridge, SyncState};
pub use carelink_core::env::Environment;
pub use client::Client;
pub use config::{ClientConfig, DEFAULT_CONTACT_REFRESH_INTERVAL, FocusPolicy};
pub use error::ClientError;
pub use event::{ClientAction, ClientEvent, Notice};
pub use send::{InFlight, Outgoing, SendCoordinator};
pub use session::{ActiveChat, ConversationSession, Resolution};
