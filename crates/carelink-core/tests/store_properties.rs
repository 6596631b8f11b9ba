//! Property-based tests for the message store.
//!
//! Three sources append into the same sequence in arbitrary interleavings;
//! these properties pin down what the conversation view may rely on no matter
//! how they race.

use std::collections::HashSet;

use carelink_core::{
    ChatId, Confirmation, ContactId, ConversationKey, Message, MessageId, MessageStore, Reconciled,
    TempId,
};
use chrono::DateTime;
use proptest::prelude::*;

fn message(id: &str) -> Message {
    Message {
        id: MessageId::server(id),
        sender_id: ContactId::new("peer"),
        text: format!("body of {id}"),
        timestamp: DateTime::from_timestamp_millis(0).unwrap_or_default(),
        is_own: false,
        read: false,
    }
}

fn own(temp: TempId, text: &str) -> Message {
    Message {
        id: MessageId::Local(temp),
        sender_id: ContactId::new("me"),
        text: text.to_string(),
        timestamp: DateTime::from_timestamp_millis(temp.millis()).unwrap_or_default(),
        is_own: true,
        read: false,
    }
}

fn key() -> ConversationKey {
    ConversationKey::Chat(ChatId::new("c1"))
}

proptest! {
    /// INVARIANT: the sequence holds each distinct id once, in first-seen order.
    #[test]
    fn prop_append_is_idempotent(ids in prop::collection::vec(0u8..12, 0..60)) {
        let mut store = MessageStore::new();
        for id in &ids {
            store.append(&key(), message(&id.to_string()));
        }

        let mut seen = HashSet::new();
        let expected: Vec<String> =
            ids.iter().map(u8::to_string).filter(|id| seen.insert(id.clone())).collect();
        let actual: Vec<String> = store.messages(&key()).iter().map(|m| m.id.to_string()).collect();

        prop_assert_eq!(actual, expected);
    }

    /// INVARIANT: confirming an optimistic entry never changes the sequence
    /// length unless the confirmed id was already present, and never leaves
    /// the confirmed id twice.
    #[test]
    fn prop_replace_keeps_ids_unique(
        before in prop::collection::vec(0u8..8, 0..10),
        after in prop::collection::vec(0u8..8, 0..10),
        confirmed in 0u8..8,
    ) {
        let mut store = MessageStore::new();
        let temp = TempId::new(1, 0);
        for id in &before {
            store.append(&key(), message(&id.to_string()));
        }
        store.append(&key(), own(temp, "hi"));
        for id in &after {
            store.append(&key(), message(&id.to_string()));
        }

        let len_before = store.messages(&key()).len();
        let position = store.position(&key(), &MessageId::Local(temp));
        let confirmation = Confirmation {
            id: confirmed.to_string(),
            timestamp: DateTime::from_timestamp_millis(2).unwrap_or_default(),
        };

        let outcome = store.replace(&key(), temp, &confirmation);
        let server_id = MessageId::server(confirmed.to_string());
        let sequence = store.messages(&key());

        prop_assert_eq!(sequence.iter().filter(|m| m.id == server_id).count(), 1);
        prop_assert!(!store.contains(&key(), &MessageId::Local(temp)));

        match outcome {
            Reconciled::Replaced => {
                prop_assert_eq!(sequence.len(), len_before);
                prop_assert_eq!(store.position(&key(), &server_id), position);
            },
            Reconciled::ReplacedDroppingEcho => {
                prop_assert_eq!(sequence.len(), len_before - 1);
                // An echo that arrived before the optimistic entry shifts it left by one
                let shifted = position.map(|p| if before.contains(&confirmed) { p - 1 } else { p });
                prop_assert_eq!(store.position(&key(), &server_id), shifted);
            },
            other => prop_assert!(false, "unexpected outcome {other:?}"),
        }
    }
}

#[test]
fn adopt_then_confirm_lands_in_chat() {
    let mut store = MessageStore::new();
    let peer = ContactId::new("u7");
    let temp = TempId::new(10, 3);

    store.append(&ConversationKey::Peer(peer.clone()), own(temp, "hello"));
    let chat = ChatId::new("c9");
    store.adopt(&peer, &chat);

    let confirmed = Confirmation {
        id: "srv-1".into(),
        timestamp: DateTime::from_timestamp_millis(20).unwrap_or_default(),
    };
    let key = ConversationKey::Chat(chat);
    assert_eq!(store.replace(&key, temp, &confirmed), Reconciled::Replaced);

    let sequence = store.messages(&key);
    assert_eq!(sequence.len(), 1);
    assert_eq!(sequence[0].id, MessageId::server("srv-1"));
    assert!(sequence[0].is_own);
}
