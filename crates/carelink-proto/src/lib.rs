//! Carelink wire protocol
//!
//! Shapes of the records exchanged with the staff-portal messaging backend:
//! REST responses (roster, chat history, send receipts) and the JSON events
//! delivered over the push channel.
//!
//! The backend is heterogeneous: the same logical field arrives under
//! different names depending on the endpoint (`id` or `_id`, `fullName` or
//! `name`) and ids may be JSON strings or integers. This crate models every
//! field as optional and accepts all known aliases. Deciding what is required
//! is left to normalization in `carelink-core`, so a single malformed record
//! never fails the decoding of its siblings.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod errors;
pub mod push;
pub mod wire;

pub use errors::{ProtocolError, Result};
pub use push::{MessageCreated, MessageRead, PresenceChanged, PushEvent};
pub use wire::{
    ChatEnvelope, ConfirmedRecord, ContactRecord, MessageRecord, SendMessageRequest, SendReceipt,
    WireId,
};
