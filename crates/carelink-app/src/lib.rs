//! Application layer for the messaging sync core
//!
//! Generic async runtime that executes the client's actions against real
//! transports, so the same loop runs in production and under a paused clock
//! in the simulation harness.
//!
//! # Components
//!
//! - [`RestApi`]: REST collaborator (contacts, chats, messages, send, read)
//! - [`PushChannel`]: Push subscription yielding events and connectivity
//! - [`Runtime`]: Orchestration loop owning the [`carelink_client::Client`]
//! - [`RuntimeHandle`]: Command surface for the UI shell
//! - [`SystemEnv`]: Production environment backed by tokio time

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod error;
mod runtime;
mod system_env;
mod transport;

pub use config::{DEFAULT_COMMAND_BUFFER, DEFAULT_TICK_INTERVAL, SyncConfig};
pub use error::RuntimeError;
pub use runtime::{Runtime, RuntimeHandle, SyncSnapshot};
pub use system_env::SystemEnv;
pub use transport::{PushChannel, PushSignal, RestApi};
