//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::HashSet;

use carelink_core::{ConversationKey, MessageId};

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// Ids within one conversation are unique.
///
/// Push, poll and send confirmation all write the same sequence; a duplicate
/// means two sources were merged without deduplication.
pub struct UniqueMessageIds;

impl Invariant for UniqueMessageIds {
    fn name(&self) -> &'static str {
        "unique_message_ids"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for (key, messages) in &state.sequences {
            let mut seen = HashSet::new();
            if let Some(duplicate) = messages.iter().find(|m| !seen.insert(&m.id)) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{key}: id {} appears twice", duplicate.id),
                });
            }
        }
        Ok(())
    }
}

/// The active chat has a cached sequence.
///
/// A chat becomes active only through resolution, a send receipt or a focus
/// change, and each of those writes its sequence.
pub struct ActiveChatHasSequence;

impl Invariant for ActiveChatHasSequence {
    fn name(&self) -> &'static str {
        "active_chat_has_sequence"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let Some(chat_id) = &state.active.chat_id else {
            return Ok(());
        };

        if state.sequences.contains_key(&ConversationKey::Chat(chat_id.clone())) {
            Ok(())
        } else {
            Err(Violation {
                invariant: self.name(),
                message: format!("active chat {chat_id} has no sequence"),
            })
        }
    }
}

/// Temporary ids only exist for sends still awaiting the server.
///
/// Once a send is confirmed or rolled back its optimistic entry must be
/// rewritten or removed.
pub struct LocalIdsArePending;

impl Invariant for LocalIdsArePending {
    fn name(&self) -> &'static str {
        "local_ids_are_pending"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for (key, messages) in &state.sequences {
            let orphan = messages.iter().find_map(|m| match m.id {
                MessageId::Local(temp_id) if !state.pending.contains(&temp_id) => Some(temp_id),
                _ => None,
            });
            if let Some(temp_id) = orphan {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{key}: temporary id {temp_id} outlived its send"),
                });
            }
        }
        Ok(())
    }
}

/// Ownership flags agree with the sender.
pub struct OwnershipMatchesSender;

impl Invariant for OwnershipMatchesSender {
    fn name(&self) -> &'static str {
        "ownership_matches_sender"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for (key, messages) in &state.sequences {
            if let Some(m) = messages.iter().find(|m| m.is_own != (m.sender_id == state.self_id)) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{key}: message {} from {} has is_own={}",
                        m.id, m.sender_id, m.is_own
                    ),
                });
            }
        }
        Ok(())
    }
}

/// The roster lists each contact once and never the current user.
pub struct RosterWellFormed;

impl Invariant for RosterWellFormed {
    fn name(&self) -> &'static str {
        "roster_well_formed"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut seen = HashSet::new();
        for contact in &state.contacts {
            if contact.id == state.self_id {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("current user {} listed in roster", contact.id),
                });
            }
            if !seen.insert(&contact.id) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("contact {} listed twice", contact.id),
                });
            }
        }
        Ok(())
    }
}
