//! End-to-end flow through the runtime services
//!
//! A customer opens a ticket and joins its room, staff joins and answers,
//! changes the status and leaves a note; every participant sees the same
//! ordered stream and the stored log matches it.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use helpdesk_core::environment::{Clock, SystemClock};
use helpdesk_core::store::TicketStore;
use helpdesk_core::{EventKind, MessageKind, TicketStatus};
use helpdesk_runtime::{
    ChatBroadcast, ChatCoordinator, LifecycleManager, NotificationDispatcher, ProtocolGenerator,
};
use helpdesk_testing::{InMemoryTicketStore, RecordingNotifier, StaticAuthorizer, fixtures};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

// ============================================================================
// Test Fixtures
// ============================================================================

struct Services {
    store: Arc<InMemoryTicketStore>,
    notifier: Arc<RecordingNotifier>,
    chat: Arc<ChatCoordinator>,
    manager: LifecycleManager,
}

fn services() -> Services {
    helpdesk_testing::init_test_tracing();

    let store = Arc::new(InMemoryTicketStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let chat = Arc::new(ChatCoordinator::new(store.clone(), clock.clone()));
    let manager = LifecycleManager::new(
        store.clone(),
        Arc::new(StaticAuthorizer::allow_all()),
        NotificationDispatcher::new(notifier.clone()),
        chat.clone(),
        ProtocolGenerator::new(clock.clone(), -180),
        clock,
    );

    Services {
        store,
        notifier,
        chat,
        manager,
    }
}

async fn next(inbox: &mut UnboundedReceiver<ChatBroadcast>) -> ChatBroadcast {
    tokio::time::timeout(Duration::from_secs(1), inbox.recv())
        .await
        .expect("broadcast within a second")
        .expect("outbox still open")
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_customer_and_staff_conversation() {
    let s = services();
    let ticket = s.manager.open_ticket(fixtures::submission()).await.unwrap();
    let room = ticket.protocol.clone();

    let (customer, mut customer_inbox) = s.chat.connect();
    let (staff, mut staff_inbox) = s.chat.connect();

    s.chat.join(customer, &room, "Ana").await.unwrap();
    assert_eq!(next(&mut customer_inbox).await.text, "Ana entered the chat");

    s.chat.join(staff, &room, "Support (Dana)").await.unwrap();
    assert_eq!(next(&mut customer_inbox).await.text, "Support (Dana) entered the chat");
    assert_eq!(next(&mut staff_inbox).await.text, "Support (Dana) entered the chat");

    s.chat.send(customer, &room, "Ana", "hello").await.unwrap();
    let to_customer = next(&mut customer_inbox).await;
    let to_staff = next(&mut staff_inbox).await;
    assert_eq!(to_customer, to_staff);
    assert_eq!(to_staff.text, "hello");
    assert!(!to_staff.is_system);

    s.manager
        .update(
            &room,
            Some(TicketStatus::InProgress),
            Some("checking the printer queue".to_string()),
            fixtures::staff_actor(),
        )
        .await
        .unwrap();
    let status = next(&mut customer_inbox).await;
    let comment = next(&mut customer_inbox).await;
    assert_eq!(status.kind, MessageKind::StatusChange);
    assert_eq!(comment.kind, MessageKind::Comment);

    s.chat.disconnect(customer).await;
    assert_eq!(next(&mut staff_inbox).await.kind, MessageKind::StatusChange);
    assert_eq!(next(&mut staff_inbox).await.kind, MessageKind::Comment);
    assert_eq!(next(&mut staff_inbox).await.text, "Ana left the chat");

    let log: Vec<_> = s
        .store
        .messages(&room)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(
        log,
        vec![
            "Ana entered the chat",
            "Support (Dana) entered the chat",
            "hello",
            "status changed to In Progress",
            "checking the printer queue",
            "Ana left the chat",
        ]
    );

    let calls = s.notifier.wait_for_calls(2, Duration::from_secs(1)).await;
    assert_eq!(calls.iter().filter(|(_, k)| *k == EventKind::Open).count(), 1);
    assert_eq!(calls.iter().filter(|(_, k)| *k == EventKind::Update).count(), 1);
}

#[tokio::test]
async fn test_rooms_are_independent() {
    let s = services();
    let first = s.manager.open_ticket(fixtures::submission()).await.unwrap();
    let second = s.manager.open_ticket(fixtures::submission()).await.unwrap();

    let (a, mut a_inbox) = s.chat.connect();
    let (b, mut b_inbox) = s.chat.connect();
    s.chat.join(a, &first.protocol, "A").await.unwrap();
    s.chat.join(b, &second.protocol, "B").await.unwrap();
    let _ = next(&mut a_inbox).await;
    let _ = next(&mut b_inbox).await;

    s.chat.send(a, &first.protocol, "A", "only for the first room").await.unwrap();

    assert_eq!(next(&mut a_inbox).await.text, "only for the first room");
    assert!(b_inbox.try_recv().is_err());
    assert!(s.chat.send(a, &second.protocol, "A", "sneaky").await.is_err());
}
