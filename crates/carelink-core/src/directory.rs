//! Contact directory.
//!
//! Holds the normalized roster shown next to the conversation view. A refresh
//! is split in two halves so the directory stays free of I/O:
//! [`ContactDirectory::begin_refresh`] is called when the fetch is issued and
//! [`ContactDirectory::apply_roster`] when it completes.
//!
//! # Ordering
//!
//! Online contacts come first, then everyone else; within each group contacts
//! are ordered by display name, compared case-insensitively. Presence updates
//! change a contact's status in place and do not reorder the roster; the next
//! refresh does.

use std::{cmp::Ordering, collections::HashSet};

use carelink_proto::ContactRecord;

use crate::{
    error::ApiError,
    normalize,
    types::{Contact, ContactId, PresenceStatus},
};

/// Normalized, sorted roster.
#[derive(Debug, Clone)]
pub struct ContactDirectory {
    /// Current user, never listed.
    self_id: ContactId,
    /// Sorted roster.
    contacts: Vec<Contact>,
    /// Non-silent refreshes in flight.
    pending_loads: u32,
}

impl ContactDirectory {
    /// Create an empty directory for the given user.
    pub fn new(self_id: ContactId) -> Self {
        Self { self_id, contacts: Vec::new(), pending_loads: 0 }
    }

    /// Mark a refresh as issued.
    ///
    /// A silent refresh (background refresh after an auto-switch or a timer
    /// tick) leaves the loading indicator untouched.
    pub fn begin_refresh(&mut self, silent: bool) {
        if !silent {
            self.pending_loads += 1;
        }
    }

    /// Install the outcome of a roster fetch.
    ///
    /// On failure the directory empties; the periodic refresh retries. The
    /// loading indicator clears once every non-silent refresh has completed.
    /// Returns the number of contacts listed.
    pub fn apply_roster(
        &mut self,
        silent: bool,
        result: Result<Vec<ContactRecord>, ApiError>,
    ) -> usize {
        if !silent {
            self.pending_loads = self.pending_loads.saturating_sub(1);
        }

        match result {
            Ok(records) => {
                let mut seen = HashSet::new();
                let mut contacts = normalize::contacts(&records);
                contacts.retain(|c| c.id != self.self_id && seen.insert(c.id.clone()));
                contacts.sort_by(roster_order);
                self.contacts = contacts;
            },
            Err(error) => {
                tracing::warn!(%error, "roster fetch failed, clearing directory");
                self.contacts.clear();
            },
        }

        self.contacts.len()
    }

    /// Apply a presence change to one contact.
    ///
    /// Returns `false` if the contact is not listed.
    pub fn set_presence(&mut self, id: &ContactId, status: PresenceStatus) -> bool {
        match self.contacts.iter_mut().find(|c| &c.id == id) {
            Some(contact) => {
                contact.status = status;
                true
            },
            None => {
                tracing::debug!(contact_id = %id, "presence for unlisted contact ignored");
                false
            },
        }
    }

    /// Listed contact by id.
    pub fn get(&self, id: &ContactId) -> Option<&Contact> {
        self.contacts.iter().find(|c| &c.id == id)
    }

    /// Sorted roster.
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// Whether a non-silent refresh is in flight.
    pub fn is_loading(&self) -> bool {
        self.pending_loads > 0
    }

    /// Current user's id.
    pub fn self_id(&self) -> &ContactId {
        &self.self_id
    }

    /// Sum of unread counts over the roster.
    pub fn total_unread(&self) -> u64 {
        self.contacts.iter().map(|c| u64::from(c.unread_count)).sum()
    }
}

/// Online first, then by folded display name; raw name and id break ties.
fn roster_order(a: &Contact, b: &Contact) -> Ordering {
    let online = |c: &Contact| c.status != PresenceStatus::Online;

    online(a)
        .cmp(&online(b))
        .then_with(|| a.display_name.to_lowercase().cmp(&b.display_name.to_lowercase()))
        .then_with(|| a.display_name.cmp(&b.display_name))
        .then_with(|| a.id.cmp(&b.id))
}
