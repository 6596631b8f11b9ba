//! End-to-end sync scenarios on the simulated backend.
//!
//! # Oracle Pattern
//!
//! Scenarios end with oracle checks that verify:
//! - The conversation on screen matches what the server holds
//! - Temporary ids never survive their send
//! - The standard invariants hold

use std::time::Duration;

use carelink_app::SyncConfig;
use carelink_client::{FocusPolicy, Notice};
use carelink_core::{ContactId, MessageId, PresenceStatus};
use carelink_harness::{Request, SimWorld, WorldConfig};

fn nurse() -> ContactId {
    ContactId::new("nurse-lee")
}

fn doctor() -> ContactId {
    ContactId::new("dr-silva")
}

#[tokio::test(start_paused = true)]
async fn roster_loads_without_current_user() {
    let world = SimWorld::start();
    world.settle().await;

    let snapshot = world.snapshot().await.unwrap();
    let ids: Vec<_> = snapshot.directory.contacts().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids.len(), 3);
    assert!(!ids.contains(&"dr-okafor"));
    world.check_invariants().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn roster_refreshes_silently_every_30s() {
    let world = SimWorld::start();
    world.advance(Duration::from_secs(65)).await;

    let refreshes =
        world.backend.requests().iter().filter(|r| matches!(r, Request::Contacts)).count();
    assert_eq!(refreshes, 3);
    assert!(!world.snapshot().await.unwrap().directory.is_loading());
}

#[tokio::test(start_paused = true)]
async fn opening_a_chat_loads_history_and_marks_read() {
    let world = SimWorld::start();
    let (chat, first) = world.backend.peer_writes(&nurse(), "Bed 4 needs review");

    let active = world.open(&nurse()).await.unwrap();

    assert_eq!(active, Some(chat.clone()));
    assert_eq!(world.visible_ids().await.unwrap(), vec![MessageId::server(first)]);
    assert!(world.backend.requests().contains(&Request::MarkRead(chat.clone())));
    assert!(world.backend.history(&chat).iter().all(|r| r.read == Some(true)));
    world.check_invariants().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn send_then_confirm_keeps_one_entry_with_server_id() {
    let world = SimWorld::with_config(WorldConfig { latency_ms: 50..=300, ..Default::default() });
    world.open(&nurse()).await.unwrap();

    world.send("hi").await.unwrap();
    world.settle().await;

    let snapshot = world.snapshot().await.unwrap();
    let sent: Vec<_> = snapshot.visible.iter().filter(|m| m.text == "hi").collect();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].is_own);
    assert!(matches!(&sent[0].id, MessageId::Server(id) if id.starts_with("msg-")));
    assert!(snapshot.pending.is_empty());
    world.check_invariants().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn send_then_fail_restores_draft() {
    let mut world = SimWorld::start();
    world.open(&nurse()).await.unwrap();
    world.backend.fail_sends(1);

    world.send("hi").await.unwrap();
    world.settle().await;

    let snapshot = world.snapshot().await.unwrap();
    assert!(snapshot.visible.iter().all(|m| m.text != "hi"));
    assert_eq!(snapshot.draft, "hi");
    assert!(matches!(
        world.handle_mut().try_notice(),
        Some(Notice::SendFailed { text, .. }) if text == "hi"
    ));
    world.check_invariants().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn first_message_to_new_peer_adopts_the_chat() {
    let world = SimWorld::with_config(WorldConfig { latency_ms: 100..=100, ..Default::default() });
    world.handle().select(doctor()).await.unwrap();

    // Compose before the chat resolves
    world.send("Need a second opinion").await.unwrap();
    world.settle().await;

    let chat = world.backend.chat_for(&doctor()).unwrap();
    let snapshot = world.snapshot().await.unwrap();
    assert_eq!(snapshot.active.chat_id, Some(chat.clone()));

    let ids: Vec<_> = snapshot.visible.iter().map(|m| m.id.to_string()).collect();
    assert_eq!(ids, world.backend.message_ids(&chat));
    world.check_invariants().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn background_message_steals_focus() {
    let mut world = SimWorld::start();
    world.backend.peer_writes(&nurse(), "morning");
    world.open(&nurse()).await.unwrap();

    let (chat, id) = world.backend.peer_writes(&doctor(), "Labs are back");
    world.settle().await;

    let snapshot = world.snapshot().await.unwrap();
    assert_eq!(snapshot.active.chat_id, Some(chat));
    assert_eq!(snapshot.active.peer, Some(doctor()));
    assert!(snapshot.visible.iter().any(|m| m.id == MessageId::server(id.as_str())));
    assert!(matches!(world.handle_mut().try_notice(), Some(Notice::FocusFollowed { .. })));
    world.check_invariants().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stay_policy_keeps_focus() {
    let sync = SyncConfig { focus_policy: FocusPolicy::Stay, ..SyncConfig::default() };
    let world = SimWorld::with_config(WorldConfig { sync, ..Default::default() });
    let nurse_chat = world.open(&nurse()).await.unwrap();

    let (doctor_chat, id) = world.backend.peer_writes(&doctor(), "Labs are back");
    world.settle().await;

    let snapshot = world.snapshot().await.unwrap();
    assert_eq!(snapshot.active.chat_id, nurse_chat);
    let background = snapshot.store.messages(&carelink_core::ConversationKey::Chat(doctor_chat));
    assert!(background.iter().any(|m| m.id == MessageId::server(id.as_str())));
}

#[tokio::test(start_paused = true)]
async fn poller_stops_once_push_connects() {
    let world = SimWorld::with_config(WorldConfig { push_connected: false, ..Default::default() });
    let chat = world.open(&nurse()).await.unwrap().unwrap();

    world.advance(Duration::from_secs(20)).await;
    assert!(world.backend.fetches(&chat) >= 2);

    world.push.connect();
    world.settle().await;
    let at_connect = world.backend.fetches(&chat);

    world.advance(Duration::from_secs(60)).await;
    assert_eq!(world.backend.fetches(&chat), at_connect);
    assert!(!world.snapshot().await.unwrap().polling);
}

#[tokio::test(start_paused = true)]
async fn poll_delivers_messages_lost_while_down() {
    let world = SimWorld::start();
    let chat = world.open(&nurse()).await.unwrap().unwrap();

    world.push.disconnect();
    let (_, id) = world.backend.peer_writes(&nurse(), "Patient discharged");
    world.settle().await;
    assert!(!world.visible_ids().await.unwrap().contains(&MessageId::server(id.as_str())));

    world.advance(Duration::from_secs(9)).await;
    assert_eq!(world.backend.fetches(&chat), 1);
    assert!(world.visible_ids().await.unwrap().contains(&MessageId::server(id.as_str())));
    assert_eq!(world.push.dropped(), 1);
}

#[tokio::test(start_paused = true)]
async fn reconnect_fetches_active_chat_immediately() {
    let world = SimWorld::start();
    let chat = world.open(&nurse()).await.unwrap().unwrap();

    world.push.disconnect();
    let (_, id) = world.backend.peer_writes(&nurse(), "On my way");
    world.push.reconnect();
    world.settle().await;

    assert_eq!(world.backend.fetches(&chat), 1);
    assert!(world.visible_ids().await.unwrap().contains(&MessageId::server(id.as_str())));
    assert!(!world.snapshot().await.unwrap().polling);
}

#[tokio::test(start_paused = true)]
async fn stale_resolution_never_overrides_newer_selection() {
    let world = SimWorld::start();
    world.backend.slow_down(&nurse(), Duration::from_secs(2));

    world.handle().select(nurse()).await.unwrap();
    world.handle().select(doctor()).await.unwrap();
    world.advance(Duration::from_secs(3)).await;

    let snapshot = world.snapshot().await.unwrap();
    assert_eq!(snapshot.active.peer, Some(doctor()));
    assert_eq!(snapshot.active.chat_id, world.backend.chat_for(&doctor()));
    world.check_invariants().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn read_receipt_only_touches_active_chat() {
    let world = SimWorld::start();
    let doctor_chat = world.open(&doctor()).await.unwrap().unwrap();
    world.send("Can you check bed 4?").await.unwrap();
    world.settle().await;

    world.open(&nurse()).await.unwrap();
    world.send("On my way").await.unwrap();
    world.settle().await;

    world.backend.peer_reads(&doctor());
    world.settle().await;

    let snapshot = world.snapshot().await.unwrap();
    assert!(snapshot.visible.iter().all(|m| !m.read));
    let background = snapshot.store.messages(&carelink_core::ConversationKey::Chat(doctor_chat));
    assert!(background.iter().all(|m| !m.read));

    // Returning to the chat reloads the server's read flags
    world.open(&doctor()).await.unwrap();
    let snapshot = world.snapshot().await.unwrap();
    assert!(snapshot.visible.iter().all(|m| m.read));
}

#[tokio::test(start_paused = true)]
async fn read_receipt_for_active_chat_marks_it_read() {
    let world = SimWorld::start();
    world.open(&doctor()).await.unwrap();
    world.send("Can you check bed 4?").await.unwrap();
    world.settle().await;

    world.backend.peer_reads(&doctor());
    world.settle().await;

    let snapshot = world.snapshot().await.unwrap();
    assert!(!snapshot.visible.is_empty());
    assert!(snapshot.visible.iter().all(|m| m.read));
}

#[tokio::test(start_paused = true)]
async fn presence_change_updates_roster() {
    let world = SimWorld::start();
    world.settle().await;

    world.backend.set_presence(&ContactId::new("tech-ward"), "online");
    world.settle().await;

    let snapshot = world.snapshot().await.unwrap();
    let tech = snapshot.directory.get(&ContactId::new("tech-ward")).unwrap();
    assert_eq!(tech.status, PresenceStatus::Online);
}

#[tokio::test(start_paused = true)]
async fn failed_poll_keeps_cache() {
    let world = SimWorld::start();
    let (_, id) = world.backend.peer_writes(&nurse(), "BP 120/80, stable");
    world.open(&nurse()).await.unwrap();

    world.push.disconnect();
    world.backend.fail_fetches(1);
    world.advance(Duration::from_secs(9)).await;

    assert_eq!(world.visible_ids().await.unwrap(), vec![MessageId::server(id)]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_timers() {
    let world = SimWorld::with_config(WorldConfig { push_connected: false, ..Default::default() });
    world.open(&nurse()).await.unwrap();
    world.advance(Duration::from_secs(2)).await;

    let client = world.shutdown().await.unwrap();
    assert!(!client.is_polling());
    assert!(!client.is_refreshing_roster());
}
