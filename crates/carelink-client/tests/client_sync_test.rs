//! Client state machine scenarios.
//!
//! Each test drives the client through events the way the runtime would and
//! feeds back REST results by hand, in the order the scenario needs. Sources
//! racing each other is the point: results arrive late, twice, or for chats
//! that are no longer on screen.

use std::time::Duration;

use carelink_client::{
    Client, ClientAction, ClientConfig, ClientError, ClientEvent, FocusPolicy, Notice,
};
use carelink_core::{
    ApiError, ChatId, ContactId, ConversationKey, MessageId, TempId,
    env::{Environment, test_utils::MockEnv},
};
use carelink_proto::{ChatEnvelope, ContactRecord, MessageRecord, PushEvent, SendReceipt};
use proptest::prelude::*;

struct TestClient {
    env: MockEnv,
    client: Client<MockEnv>,
}

impl TestClient {
    fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    fn with_config(config: ClientConfig) -> Self {
        let env = MockEnv::new();
        let mut client = Client::new(env.clone(), ContactId::new("me"), config);
        client.handle(ClientEvent::Start).unwrap();
        client
            .handle(ClientEvent::ContactsFetched {
                silent: false,
                result: Ok(vec![
                    ContactRecord::new("me", "Myself"),
                    ContactRecord::new("u1", "Ada").with_status("online"),
                    ContactRecord::new("u2", "Bob"),
                    ContactRecord::new("u3", "Cleo"),
                ]),
            })
            .unwrap();
        Self { env, client }
    }

    fn handle(&mut self, event: ClientEvent) -> Vec<ClientAction> {
        self.client.handle(event).unwrap()
    }

    /// Select a peer and answer the chat resolution with `history`.
    fn open(&mut self, peer: &str, chat: &str, history: Vec<MessageRecord>) -> Vec<ClientAction> {
        let peer = ContactId::new(peer);
        self.handle(ClientEvent::SelectContact { peer: peer.clone() });
        self.handle(ClientEvent::ChatResolved {
            peer,
            result: Ok(ChatEnvelope::new(chat, history)),
        })
    }

    /// Type and send; returns the temporary id of the optimistic entry.
    fn send(&mut self, text: &str) -> TempId {
        self.handle(ClientEvent::ComposeChanged { text: text.to_string() });
        let actions = self.handle(ClientEvent::Send);
        match actions.as_slice() {
            [ClientAction::PostMessage { temp_id, .. }] => *temp_id,
            other => panic!("expected one PostMessage, got {other:?}"),
        }
    }

    fn tick(&mut self, by: Duration) -> Vec<ClientAction> {
        self.env.advance(by);
        let now = self.env.now();
        self.handle(ClientEvent::Tick { now })
    }

    fn chat(&self, chat: &str) -> Vec<(String, String, bool)> {
        self.client
            .store()
            .messages(&ConversationKey::Chat(ChatId::new(chat)))
            .iter()
            .map(|m| (m.id.to_string(), m.text.clone(), m.read))
            .collect()
    }

    fn active(&self) -> Option<&str> {
        self.client.active_chat().map(ChatId::as_str)
    }
}

fn receipt(chat: &str, id: &str) -> SendReceipt {
    SendReceipt::new(chat, id, "2024-01-01T00:00:05Z")
}

fn fetches(actions: &[ClientAction]) -> Vec<&str> {
    actions
        .iter()
        .filter_map(|a| match a {
            ClientAction::FetchMessages { chat_id } => Some(chat_id.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn start_loads_roster_without_self() {
    let env = MockEnv::new();
    let mut client = Client::new(env, ContactId::new("me"), ClientConfig::default());

    let actions = client.handle(ClientEvent::Start).unwrap();
    assert_eq!(actions, vec![ClientAction::FetchContacts { silent: false }]);
    assert!(client.directory().is_loading());

    let tc = TestClient::new();
    let names: Vec<_> =
        tc.client.directory().contacts().iter().map(|c| c.display_name.as_str()).collect();
    assert_eq!(names, ["Ada", "Bob", "Cleo"]);
    assert!(!tc.client.directory().is_loading());
}

#[test]
fn roster_refreshes_silently_every_interval() {
    let mut tc = TestClient::new();

    let mut refreshes = 0;
    for _ in 0..65 {
        let actions = tc.tick(Duration::from_secs(1));
        refreshes += actions
            .iter()
            .filter(|a| **a == ClientAction::FetchContacts { silent: true })
            .count();
    }
    assert_eq!(refreshes, 2);
    assert!(!tc.client.directory().is_loading());
}

#[test]
fn selecting_resolves_and_marks_read() {
    let mut tc = TestClient::new();
    let actions = tc.handle(ClientEvent::SelectContact { peer: ContactId::new("u1") });
    assert_eq!(actions, vec![ClientAction::ResolveChat { peer: ContactId::new("u1") }]);
    assert_eq!(tc.active(), None);

    let actions = tc.handle(ClientEvent::ChatResolved {
        peer: ContactId::new("u1"),
        result: Ok(ChatEnvelope::new("A", vec![MessageRecord::new("m1", "u1", "hello")])),
    });

    assert_eq!(actions, vec![ClientAction::MarkChatRead { chat_id: ChatId::new("A") }]);
    assert_eq!(tc.active(), Some("A"));
    assert_eq!(tc.client.visible_messages().len(), 1);
}

#[test]
fn selecting_self_is_rejected() {
    let mut tc = TestClient::new();
    let result = tc.client.handle(ClientEvent::SelectContact { peer: ContactId::new("me") });
    assert_eq!(result, Err(ClientError::SelfSelected));

    let result = tc.client.handle(ClientEvent::Send);
    assert_eq!(result, Err(ClientError::NoConversation));
}

#[test]
fn failed_resolution_keeps_active_chat() {
    let mut tc = TestClient::new();
    tc.open("u1", "A", vec![]);

    tc.handle(ClientEvent::SelectContact { peer: ContactId::new("u1") });
    let actions = tc.handle(ClientEvent::ChatResolved {
        peer: ContactId::new("u1"),
        result: Err(ApiError::Status { code: 502 }),
    });

    assert!(actions.is_empty());
    assert_eq!(tc.active(), Some("A"));
}

/// INVARIANT: after a confirmed send the chat holds exactly one "hi", owned,
/// under the server id.
#[test]
fn send_then_confirm_replaces_in_place() {
    let mut tc = TestClient::new();
    tc.open("u2", "B", vec![MessageRecord::new("m1", "u2", "earlier")]);

    let temp_id = tc.send("hi");
    assert_eq!(tc.client.draft(&ContactId::new("u2")), "");
    assert_eq!(tc.chat("B")[1], (temp_id.to_string(), "hi".to_string(), false));

    tc.handle(ClientEvent::MessagePosted { temp_id, result: Ok(receipt("B", "srv-1")) });

    let hi: Vec<_> = tc.client.visible_messages().iter().filter(|m| m.text == "hi").collect();
    assert_eq!(hi.len(), 1);
    assert!(hi[0].is_own);
    assert_eq!(hi[0].id, MessageId::server("srv-1"));
    assert_eq!(tc.chat("B")[1].0, "srv-1");
    assert!(!tc.client.is_sending(&ContactId::new("u2")));
}

/// INVARIANT: after a failed send nothing with the text remains and the
/// compose field holds it again.
#[test]
fn send_then_fail_rolls_back() {
    let mut tc = TestClient::new();
    tc.open("u2", "B", vec![]);

    let temp_id = tc.send("hi");
    let actions = tc.handle(ClientEvent::MessagePosted {
        temp_id,
        result: Err(ApiError::Transport("connection reset".into())),
    });

    assert!(tc.client.visible_messages().iter().all(|m| m.text != "hi"));
    assert_eq!(tc.client.draft(&ContactId::new("u2")), "hi");
    assert!(matches!(
        actions.as_slice(),
        [ClientAction::Notify(Notice::SendFailed { text, .. })] if text == "hi"
    ));
}

#[test]
fn blank_or_repeated_send_is_ignored() {
    let mut tc = TestClient::new();
    tc.open("u2", "B", vec![]);

    tc.handle(ClientEvent::ComposeChanged { text: "   ".into() });
    assert!(tc.handle(ClientEvent::Send).is_empty());

    tc.send("first");
    tc.handle(ClientEvent::ComposeChanged { text: "second".into() });
    assert!(tc.handle(ClientEvent::Send).is_empty());
    assert_eq!(tc.client.draft(&ContactId::new("u2")), "second");
}

#[test]
fn sends_to_different_conversations_run_concurrently() {
    let mut tc = TestClient::new();
    tc.open("u1", "A", vec![]);
    let to_a = tc.send("for ada");
    tc.open("u2", "B", vec![]);
    let to_b = tc.send("for bob");
    assert_ne!(to_a, to_b);

    tc.handle(ClientEvent::MessagePosted { temp_id: to_b, result: Ok(receipt("B", "b1")) });
    tc.handle(ClientEvent::MessagePosted { temp_id: to_a, result: Err(ApiError::Unauthorized) });

    assert_eq!(tc.chat("B"), [("b1".to_string(), "for bob".to_string(), false)]);
    assert!(tc.chat("A").is_empty());
    assert_eq!(tc.client.draft(&ContactId::new("u1")), "for ada");
    assert_eq!(tc.active(), Some("B"));
}

#[test]
fn first_message_adopts_chat_from_receipt() {
    let mut tc = TestClient::new();
    tc.handle(ClientEvent::SelectContact { peer: ContactId::new("u3") });

    let temp_id = tc.send("hello cleo");
    assert_eq!(tc.client.visible_messages().len(), 1);

    tc.handle(ClientEvent::MessagePosted { temp_id, result: Ok(receipt("C", "c1")) });
    assert_eq!(tc.active(), Some("C"));
    assert_eq!(tc.chat("C"), [("c1".to_string(), "hello cleo".to_string(), false)]);
    assert!(
        tc.client.store().messages(&ConversationKey::Peer(ContactId::new("u3"))).is_empty()
    );

    // Resolution answered late, with the server's copy of the same message
    tc.handle(ClientEvent::ChatResolved {
        peer: ContactId::new("u3"),
        result: Ok(ChatEnvelope::new("C", vec![MessageRecord::new("c1", "me", "hello cleo")])),
    });
    assert_eq!(tc.chat("C").len(), 1);
}

#[test]
fn resolution_before_receipt_keeps_optimistic_entry() {
    let mut tc = TestClient::new();
    let peer = ContactId::new("u3");
    tc.handle(ClientEvent::SelectContact { peer: peer.clone() });

    let temp_id = tc.send("hi");
    tc.handle(ClientEvent::ChatResolved {
        peer: peer.clone(),
        result: Ok(ChatEnvelope::new("C", vec![MessageRecord::new("c0", "u3", "earlier")])),
    });

    let texts: Vec<_> = tc.client.visible_messages().iter().map(|m| m.text.clone()).collect();
    assert_eq!(texts, ["earlier", "hi"]);
    assert_eq!(tc.client.visible_messages()[1].id, MessageId::Local(temp_id));
    assert!(tc.client.is_sending(&peer));
    assert!(tc.client.store().messages(&ConversationKey::Peer(peer.clone())).is_empty());

    tc.handle(ClientEvent::MessagePosted { temp_id, result: Ok(receipt("C", "c1")) });
    assert_eq!(
        tc.chat("C"),
        [
            ("c0".to_string(), "earlier".to_string(), false),
            ("c1".to_string(), "hi".to_string(), false),
        ]
    );
}

#[test]
fn push_echo_before_receipt_collapses() {
    let mut tc = TestClient::new();
    tc.open("u2", "B", vec![]);

    let temp_id = tc.send("hi");
    tc.handle(ClientEvent::Push(PushEvent::message_created(
        "B",
        MessageRecord::new("srv-7", "me", "hi"),
    )));
    assert_eq!(tc.chat("B").len(), 2);

    tc.handle(ClientEvent::MessagePosted { temp_id, result: Ok(receipt("B", "srv-7")) });
    assert_eq!(tc.chat("B"), [("srv-7".to_string(), "hi".to_string(), false)]);
}

#[test]
fn resync_during_send_then_confirm_appends() {
    let mut tc = TestClient::new();
    tc.open("u2", "B", vec![MessageRecord::new("m1", "u2", "old")]);

    let temp_id = tc.send("hi");
    tc.handle(ClientEvent::MessagesFetched {
        chat_id: ChatId::new("B"),
        result: Ok(vec![MessageRecord::new("m1", "u2", "old")]),
    });
    assert_eq!(tc.chat("B").len(), 1);

    tc.handle(ClientEvent::MessagePosted { temp_id, result: Ok(receipt("B", "srv-2")) });
    let ids: Vec<_> = tc.chat("B").into_iter().map(|(id, _, _)| id).collect();
    assert_eq!(ids, ["m1", "srv-2"]);
}

/// INVARIANT: a message for a background chat switches focus to it.
#[test]
fn auto_focus_follows_message() {
    let mut tc = TestClient::new();
    tc.open("u1", "A", vec![MessageRecord::new("a1", "u1", "hi")]);

    let actions = tc.handle(ClientEvent::Push(PushEvent::message_created(
        "B",
        MessageRecord::new("x", "u2", "urgent"),
    )));

    assert_eq!(tc.active(), Some("B"));
    assert!(tc.chat("B").iter().any(|(id, _, _)| id == "x"));
    assert_eq!(tc.client.session().selected_peer(), Some(&ContactId::new("u2")));
    assert!(actions.contains(&ClientAction::FetchContacts { silent: true }));
    assert_eq!(fetches(&actions), ["B"]);
    // The previous chat keeps its cache
    assert_eq!(tc.chat("A").len(), 1);
}

#[test]
fn stay_policy_keeps_focus() {
    let config = ClientConfig { focus_policy: FocusPolicy::Stay, ..ClientConfig::default() };
    let mut tc = TestClient::with_config(config);
    tc.open("u1", "A", vec![]);

    tc.handle(ClientEvent::Push(PushEvent::message_created(
        "B",
        MessageRecord::new("x", "u2", "urgent"),
    )));

    assert_eq!(tc.active(), Some("A"));
    assert_eq!(tc.chat("B").len(), 1);
}

/// INVARIANT: a read receipt for a background chat changes nothing on
/// screen; the chat shows read once it is opened.
#[test]
fn read_receipt_is_scoped_to_active_chat() {
    let config = ClientConfig { focus_policy: FocusPolicy::Stay, ..ClientConfig::default() };
    let mut tc = TestClient::with_config(config);
    tc.open("u3", "C", vec![MessageRecord::new("c1", "me", "to cleo")]);
    tc.open("u2", "D", vec![MessageRecord::new("d1", "me", "to bob")]);

    tc.handle(ClientEvent::Push(PushEvent::message_read("C")));
    assert!(!tc.chat("D")[0].2);
    assert!(!tc.chat("C")[0].2);

    tc.open("u3", "C", vec![MessageRecord::new("c1", "me", "to cleo").with_read(true)]);
    assert!(tc.chat("C")[0].2);
    assert!(!tc.chat("D")[0].2);
}

#[test]
fn stale_resolution_keeps_latest_selection() {
    let mut tc = TestClient::new();
    tc.handle(ClientEvent::SelectContact { peer: ContactId::new("u1") });
    tc.handle(ClientEvent::SelectContact { peer: ContactId::new("u2") });

    tc.handle(ClientEvent::ChatResolved {
        peer: ContactId::new("u2"),
        result: Ok(ChatEnvelope::new("B", vec![])),
    });
    let actions = tc.handle(ClientEvent::ChatResolved {
        peer: ContactId::new("u1"),
        result: Ok(ChatEnvelope::new("A", vec![MessageRecord::new("a1", "u1", "late")])),
    });

    assert!(actions.is_empty());
    assert_eq!(tc.active(), Some("B"));
    assert_eq!(tc.chat("A").len(), 1);
}

/// INVARIANT: once push reports connected, no fallback poll follows.
#[test]
fn poller_runs_only_while_push_is_down() {
    let mut tc = TestClient::new();
    tc.handle(ClientEvent::PushConnected);
    tc.open("u1", "A", vec![]);

    for _ in 0..20 {
        assert!(fetches(&tc.tick(Duration::from_secs(1))).is_empty());
    }

    tc.handle(ClientEvent::PushDisconnected);
    assert!(tc.client.is_polling());
    let mut polls = Vec::new();
    for second in 1..=24 {
        if !fetches(&tc.tick(Duration::from_secs(1))).is_empty() {
            polls.push(second);
        }
    }
    assert_eq!(polls, [8, 16, 24]);

    tc.handle(ClientEvent::PushConnected);
    assert!(!tc.client.is_polling());
    for _ in 0..60 {
        assert!(fetches(&tc.tick(Duration::from_secs(1))).is_empty());
    }
}

#[test]
fn poll_follows_chat_switch() {
    let mut tc = TestClient::new();
    tc.open("u1", "A", vec![]);
    tc.handle(ClientEvent::PushDisconnected);

    tc.tick(Duration::from_secs(4));
    tc.open("u2", "B", vec![]);
    let actions = tc.tick(Duration::from_secs(4));
    assert_eq!(fetches(&actions), ["B"]);
}

#[test]
fn reconnect_triggers_one_catch_up_fetch() {
    let mut tc = TestClient::new();
    tc.open("u1", "A", vec![]);
    tc.handle(ClientEvent::PushDisconnected);

    let actions = tc.handle(ClientEvent::PushReconnected);
    assert_eq!(fetches(&actions), ["A"]);
    assert!(!tc.client.is_polling());
    assert!(tc.client.is_push_connected());

    for _ in 0..30 {
        assert!(fetches(&tc.tick(Duration::from_secs(1))).is_empty());
    }
}

#[test]
fn failed_poll_keeps_cache() {
    let mut tc = TestClient::new();
    tc.open("u1", "A", vec![MessageRecord::new("a1", "u1", "kept")]);

    tc.handle(ClientEvent::MessagesFetched {
        chat_id: ChatId::new("A"),
        result: Err(ApiError::Transport("timeout".into())),
    });
    assert_eq!(tc.chat("A").len(), 1);
}

#[test]
fn shutdown_cancels_timers() {
    let mut tc = TestClient::new();
    tc.open("u1", "A", vec![]);
    tc.handle(ClientEvent::PushDisconnected);
    assert!(tc.client.is_refreshing_roster());

    tc.handle(ClientEvent::Shutdown);
    assert!(!tc.client.is_polling());
    assert!(!tc.client.is_refreshing_roster());
    for _ in 0..40 {
        assert!(tc.tick(Duration::from_secs(1)).is_empty());
    }
}

#[derive(Debug, Clone, Copy)]
enum Race {
    /// Push delivers the server copy.
    Echo,
    /// Poll snapshot taken after the server stored the message.
    ResyncWith,
    /// Poll snapshot taken before the server stored the message.
    ResyncWithout,
}

fn race_strategy() -> impl Strategy<Value = Race> {
    prop_oneof![Just(Race::Echo), Just(Race::ResyncWith), Just(Race::ResyncWithout)]
}

proptest! {
    /// INVARIANT: however push, poll and the receipt interleave, the chat ends
    /// with the sent message exactly once, under its server id.
    #[test]
    fn prop_send_reconciles_under_any_race(
        before in prop::collection::vec(race_strategy(), 0..5),
        after in prop::collection::vec(race_strategy(), 0..5),
    ) {
        let mut tc = TestClient::new();
        let base = MessageRecord::new("m0", "u2", "base");
        tc.open("u2", "B", vec![base.clone()]);
        let temp_id = tc.send("hi");

        let apply = |tc: &mut TestClient, race: Race, confirmed: bool| {
            let sent = MessageRecord::new("srv", "me", "hi");
            let event = match race {
                Race::Echo => ClientEvent::Push(PushEvent::message_created("B", sent)),
                Race::ResyncWithout if !confirmed => ClientEvent::MessagesFetched {
                    chat_id: ChatId::new("B"),
                    result: Ok(vec![base.clone()]),
                },
                Race::ResyncWith | Race::ResyncWithout => ClientEvent::MessagesFetched {
                    chat_id: ChatId::new("B"),
                    result: Ok(vec![base.clone(), sent]),
                },
            };
            tc.handle(event);
        };

        for race in &before {
            apply(&mut tc, *race, false);
        }
        tc.handle(ClientEvent::MessagePosted { temp_id, result: Ok(receipt("B", "srv")) });
        for race in &after {
            apply(&mut tc, *race, true);
        }

        let messages = tc.client.store().messages(&ConversationKey::Chat(ChatId::new("B")));
        prop_assert_eq!(messages.iter().filter(|m| m.text == "hi").count(), 1);
        prop_assert!(messages.iter().all(|m| !m.id.is_local()));
        let sent = messages.iter().find(|m| m.text == "hi");
        prop_assert_eq!(sent.map(|m| m.id.clone()), Some(MessageId::server("srv")));
        prop_assert!(sent.is_some_and(|m| m.is_own));
    }
}
