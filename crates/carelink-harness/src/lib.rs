//! Deterministic simulation harness for the messaging sync core.
//!
//! Runs the production [`carelink_app::Runtime`] against an in-memory backend
//! and push channel under a paused tokio clock, so scenarios with 8 second
//! polls and 30 second roster refreshes complete instantly and reproducibly.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all interleavings, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the common
//! sync invariants.
//!
//! # Chaos Testing
//!
//! The `chaos` module drives a [`SimWorld`] through seeded random schedules
//! and reports whether the active chat converged to the server's history.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chaos;
pub mod invariants;
pub mod sim_backend;
pub mod sim_env;
pub mod sim_push;
pub mod world;

pub use chaos::{ChaosConfig, ChaosReport};
pub use invariants::{
    ActiveChatHasSequence, Invariant, InvariantRegistry, InvariantResult, LocalIdsArePending,
    OwnershipMatchesSender, RosterWellFormed, SystemSnapshot, UniqueMessageIds, Violation,
};
pub use sim_backend::{Request, SimBackend};
pub use sim_env::{SIM_EPOCH_MILLIS, SimEnv};
pub use sim_push::{PushControl, SimPush};
pub use world::{SELF_ID, SimWorld, WorldConfig, WorldError, default_peers};
