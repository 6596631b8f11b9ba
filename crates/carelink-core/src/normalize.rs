//! Wire record normalization.
//!
//! Converts the alias-tolerant records of `carelink-proto` into domain types,
//! rejecting records that lack required fields. List helpers filter rejected
//! records out (logging each) so one bad entry never poisons its siblings.

use carelink_proto::{ContactRecord, MessageRecord, SendReceipt};
use chrono::{DateTime, Utc};

use crate::{
    error::MalformedRecord,
    types::{ChatId, Confirmation, Contact, ContactId, Message, MessageId, PresenceStatus},
};

/// Normalize a roster record.
///
/// A record without a name is shown under its id.
pub fn contact(record: &ContactRecord) -> Result<Contact, MalformedRecord> {
    let id = record.resolved_id().ok_or(MalformedRecord::MissingId)?;
    let display_name = record.display_name().map_or_else(|| id.clone(), str::to_string);
    let unread = record.unread_count.unwrap_or(0).max(0);

    Ok(Contact {
        initial: initial_of(&display_name),
        id: ContactId::new(id),
        display_name,
        role: record.role.clone(),
        status: PresenceStatus::from_wire(record.status.as_deref()),
        unread_count: u32::try_from(unread).unwrap_or(u32::MAX),
        category: record.category.clone(),
    })
}

/// Normalize a message record.
///
/// `own_id` decides `is_own`; `received_at` stamps records that carry no
/// (or an unparsable) timestamp.
pub fn message(
    record: &MessageRecord,
    own_id: &ContactId,
    received_at: DateTime<Utc>,
) -> Result<Message, MalformedRecord> {
    let id = record.resolved_id().ok_or(MalformedRecord::MissingId)?;
    let text = record.content.clone().ok_or(MalformedRecord::MissingContent)?;
    let sender_id = ContactId::new(record.resolved_sender().ok_or(MalformedRecord::MissingSender)?);

    Ok(Message {
        id: MessageId::Server(id),
        is_own: &sender_id == own_id,
        sender_id,
        text,
        timestamp: timestamp(record.timestamp.as_deref(), received_at),
        read: record.read.unwrap_or(false),
    })
}

/// Normalize a list of message records, dropping malformed ones.
pub fn messages(
    records: &[MessageRecord],
    own_id: &ContactId,
    received_at: DateTime<Utc>,
) -> Vec<Message> {
    records
        .iter()
        .filter_map(|record| match message(record, own_id, received_at) {
            Ok(message) => Some(message),
            Err(reason) => {
                tracing::warn!(%reason, ?record, "dropping malformed message record");
                None
            },
        })
        .collect()
}

/// Normalize a list of roster records, dropping malformed ones.
pub fn contacts(records: &[ContactRecord]) -> Vec<Contact> {
    records
        .iter()
        .filter_map(|record| match contact(record) {
            Ok(contact) => Some(contact),
            Err(reason) => {
                tracing::warn!(%reason, ?record, "dropping malformed contact record");
                None
            },
        })
        .collect()
}

/// Normalize a send receipt into the (optional) chat id and the confirmation.
pub fn confirmation(
    receipt: &SendReceipt,
    received_at: DateTime<Utc>,
) -> Result<(Option<ChatId>, Confirmation), MalformedRecord> {
    let record = receipt.message.as_ref().ok_or(MalformedRecord::MissingId)?;
    let id = record.resolved_id().ok_or(MalformedRecord::MissingId)?;
    let chat_id = receipt.resolved_chat_id().map(ChatId::new);

    Ok((chat_id, Confirmation { id, timestamp: timestamp(record.timestamp.as_deref(), received_at) }))
}

/// Parse an RFC 3339 timestamp, falling back when absent or invalid.
pub fn timestamp(raw: Option<&str>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map_or(fallback, |t| t.with_timezone(&Utc))
}

/// Avatar initial: first alphabetic character, uppercased.
pub fn initial_of(name: &str) -> char {
    name.chars()
        .find(|c| c.is_alphabetic())
        .and_then(|c| c.to_uppercase().next())
        .unwrap_or('?')
}
