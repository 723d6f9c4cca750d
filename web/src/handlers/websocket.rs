//! Realtime chat channel.
//!
//! One WebSocket carries any number of room memberships. Frames are JSON
//! objects tagged by `type`.
//!
//! **Client → Server:**
//! ```json
//! {"type": "join", "username": "Ana", "room": "TICKET-20250101090000"}
//! {"type": "message", "room": "TICKET-20250101090000", "author": "Ana", "text": "Hello"}
//! {"type": "leave", "username": "Ana", "room": "TICKET-20250101090000"}
//! ```
//!
//! **Server → Client:**
//! ```json
//! {"type": "message", "room": "...", "author": "...", "text": "...", "kind": "chat", ...}
//! {"type": "error", "message": "You have not joined TICKET-20250101090000"}
//! ```
//!
//! Staff connect with `?token=<session token>`; their display name and
//! author label are then taken from the session, not the frame. Closing the
//! socket leaves every joined room once the frame being applied, if any,
//! has been stored.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, Stream, stream::StreamExt};
use helpdesk_core::{Actor, Protocol, Result};
use helpdesk_runtime::{ChatBroadcast, ChatCoordinator, ConnectionId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info, warn};

/// Frame sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    /// Enter a ticket's room.
    Join {
        /// Display name announced to the room.
        username: String,
        /// Ticket protocol.
        room: Protocol,
    },
    /// Leave a ticket's room.
    Leave {
        /// Display name (informational; the joined name is used).
        #[serde(default)]
        username: String,
        /// Ticket protocol.
        room: Protocol,
    },
    /// Post to a joined room.
    Message {
        /// Ticket protocol.
        room: Protocol,
        /// Author label. Blank falls back to the joined name.
        #[serde(default)]
        author: String,
        /// Body.
        text: String,
    },
}

/// Frame sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    /// A message delivered to a room the connection is in.
    Message(ChatBroadcast),
    /// A frame from this connection was rejected.
    Error {
        /// What went wrong
        message: String,
    },
}

/// Query string of the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Staff session token.
    pub token: Option<String>,
}

/// One connection's view of the chat coordinator.
pub struct ChatSession {
    chat: Arc<ChatCoordinator>,
    connection: ConnectionId,
    staff: Option<Actor>,
}

impl ChatSession {
    /// Register a connection. The receiver yields everything delivered to
    /// the rooms it joins.
    #[must_use]
    pub fn open(chat: Arc<ChatCoordinator>, staff: Option<Actor>) -> (Self, UnboundedReceiver<ChatBroadcast>) {
        let (connection, inbox) = chat.connect();
        (
            Self {
                chat,
                connection,
                staff,
            },
            inbox,
        )
    }

    /// Connection handle.
    #[must_use]
    pub const fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Apply one client frame.
    ///
    /// # Errors
    ///
    /// Whatever the coordinator rejects the frame with.
    pub async fn handle(&self, frame: ClientFrame) -> Result<()> {
        match frame {
            ClientFrame::Join { username, room } => {
                let name = self.staff.as_ref().map_or(username, Actor::label);
                self.chat.join(self.connection, &room, &name).await?;
            },
            ClientFrame::Leave { room, .. } => {
                self.chat.leave(self.connection, &room).await?;
            },
            ClientFrame::Message { room, author, text } => {
                let author = self.staff.as_ref().map_or(author, Actor::label);
                self.chat.send(self.connection, &room, &author, &text).await?;
            },
        }
        Ok(())
    }

    /// Parse and apply a text frame. Returns the error frame to send back,
    /// if any.
    pub async fn handle_text(&self, text: &str) -> Option<ServerFrame> {
        let frame = match serde_json::from_str::<ClientFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(connection = %self.connection, error = %e, "Malformed chat frame");
                return Some(ServerFrame::Error {
                    message: format!("Invalid frame: {e}"),
                });
            },
        };

        match self.handle(frame).await {
            Ok(()) => None,
            Err(e) if e.is_user_error() => Some(ServerFrame::Error { message: e.to_string() }),
            Err(e) => {
                warn!(connection = %self.connection, error = %e, "Chat frame failed");
                Some(ServerFrame::Error {
                    message: "The message could not be processed".to_string(),
                })
            },
        }
    }

    /// Leave every joined room and release the connection.
    pub async fn close(self) {
        self.chat.disconnect(self.connection).await;
    }
}

/// `GET /api/ws`: upgrade to the chat channel.
///
/// # Errors
///
/// 401 if a `token` is given but does not resolve to a session.
pub async fn handle(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
) -> std::result::Result<Response, AppError> {
    let staff = match params.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) => Some(state.gateway.resolve(token).await?),
        None => None,
    };

    info!(staff = staff.is_some(), "Chat connection requested");
    let chat = Arc::clone(&state.chat);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, chat, staff)))
}

fn encode(frame: &ServerFrame) -> Option<WsMessage> {
    match serde_json::to_string(frame) {
        Ok(json) => Some(WsMessage::Text(json)),
        Err(e) => {
            warn!(error = %e, "Failed to serialize chat frame");
            None
        },
    }
}

/// Apply inbound frames until the client goes away or `shutdown` fires.
///
/// `shutdown` is only observed between frames, so a frame being applied is
/// always finished.
async fn read_frames<S>(session: &ChatSession, mut frames: S, shutdown: &Notify, errors: &UnboundedSender<ServerFrame>)
where
    S: Stream<Item = std::result::Result<WsMessage, axum::Error>> + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            () = shutdown.notified() => {
                debug!("Chat send side closed");
                break;
            },
            next = frames.next() => next,
        };
        let Some(Ok(msg)) = next else {
            break;
        };

        match msg {
            WsMessage::Text(text) => {
                if let Some(error) = session.handle_text(&text).await {
                    if errors.send(error).is_err() {
                        break;
                    }
                }
            },
            WsMessage::Binary(_) => warn!("Received unexpected binary frame"),
            WsMessage::Ping(_) | WsMessage::Pong(_) => {},
            WsMessage::Close(_) => {
                debug!("Client requested close");
                break;
            },
        }
    }
    debug!("Chat receive task terminated");
}

/// Pump one socket until either side goes away.
async fn handle_socket(socket: WebSocket, chat: Arc<ChatCoordinator>, staff: Option<Actor>) {
    let (session, mut inbox) = ChatSession::open(chat, staff);
    let connection = session.connection();
    info!(%connection, "Chat connection established");

    let (mut sender, receiver) = socket.split();
    let (error_tx, mut error_rx) = unbounded_channel::<ServerFrame>();
    let shutdown = Arc::new(Notify::new());

    let mut send_task = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                Some(broadcast) = inbox.recv() => ServerFrame::Message(broadcast),
                Some(error) = error_rx.recv() => error,
                else => break,
            };
            let Some(message) = encode(&frame) else {
                continue;
            };
            if sender.send(message).await.is_err() {
                break;
            }
        }
        debug!("Chat send task terminated");
    });

    let session = Arc::new(session);
    let reader = Arc::clone(&session);
    let stop = Arc::clone(&shutdown);
    let mut recv_task = tokio::spawn(async move {
        read_frames(&reader, receiver, &stop, &error_tx).await;
    });

    let client_gone = tokio::select! {
        _ = (&mut send_task) => false,
        _ = (&mut recv_task) => true,
    };
    if client_gone {
        send_task.abort();
    } else {
        // Let the frame in progress finish before tearing the session down.
        shutdown.notify_one();
        let _ = recv_task.await;
    }

    match Arc::try_unwrap(session) {
        Ok(session) => session.close().await,
        Err(session) => session.chat.disconnect(connection).await,
    }

    info!(%connection, "Chat connection closed");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use helpdesk_core::environment::Clock;
    use helpdesk_core::lifecycle::TicketCommand;
    use helpdesk_core::store::{Applied, BoxFuture, TicketStore};
    use helpdesk_core::{DateTime, Message, MessageKind, NewMessage, NewTicket, SYSTEM_AUTHOR, Ticket, Utc};
    use helpdesk_testing::{InMemoryTicketStore, fixtures, test_clock};
    use std::time::Duration;

    const ROOM: &str = "TICKET-20250101090000";

    async fn coordinator() -> Arc<ChatCoordinator> {
        let store = Arc::new(InMemoryTicketStore::new());
        store.insert_ticket(fixtures::new_ticket(ROOM)).await.unwrap();
        let clock: Arc<dyn Clock> = Arc::new(test_clock());
        Arc::new(ChatCoordinator::new(store, clock))
    }

    fn join(username: &str) -> ClientFrame {
        ClientFrame::Join {
            username: username.to_string(),
            room: Protocol::new(ROOM),
        }
    }

    #[test]
    fn test_client_frame_wire_format() {
        let frame: ClientFrame = serde_json::from_str(
            r#"{"type":"message","room":"TICKET-20250101090000","author":"Ana","text":"hi"}"#,
        )
        .unwrap();
        assert_eq!(
            frame,
            ClientFrame::Message {
                room: Protocol::new(ROOM),
                author: "Ana".to_string(),
                text: "hi".to_string(),
            }
        );

        let frame: ClientFrame = serde_json::from_str(r#"{"type":"leave","room":"TICKET-20250101090000"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Leave { .. }));
    }

    #[test]
    fn test_server_error_frame_wire_format() {
        let json = serde_json::to_value(ServerFrame::Error {
            message: "nope".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "error", "message": "nope"}));
    }

    #[tokio::test]
    async fn test_customer_join_and_message() {
        let chat = coordinator().await;
        let (session, mut inbox) = ChatSession::open(Arc::clone(&chat), None);

        session.handle(join("Ana")).await.unwrap();
        let joined = inbox.recv().await.unwrap();
        assert_eq!(joined.text, "Ana entered the chat");
        assert_eq!(joined.author, SYSTEM_AUTHOR);

        let reply = session
            .handle_text(r#"{"type":"message","room":"TICKET-20250101090000","author":"Ana","text":"Hello"}"#)
            .await;
        assert!(reply.is_none());

        let message = inbox.recv().await.unwrap();
        assert_eq!(message.author, "Ana");
        assert_eq!(message.text, "Hello");
        assert_eq!(message.kind, MessageKind::Chat);
    }

    #[tokio::test]
    async fn test_staff_identity_overrides_frame_names() {
        let chat = coordinator().await;
        let (session, mut inbox) = ChatSession::open(Arc::clone(&chat), Some(fixtures::staff_actor()));

        session.handle(join("Someone Else")).await.unwrap();
        assert_eq!(inbox.recv().await.unwrap().text, "Support (Dana) entered the chat");

        session
            .handle(ClientFrame::Message {
                room: Protocol::new(ROOM),
                author: "Someone Else".to_string(),
                text: "On it".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(inbox.recv().await.unwrap().author, "Support (Dana)");
    }

    #[tokio::test]
    async fn test_message_before_join_is_an_error_frame() {
        let chat = coordinator().await;
        let (session, _inbox) = ChatSession::open(chat, None);

        let reply = session
            .handle_text(r#"{"type":"message","room":"TICKET-20250101090000","author":"Ana","text":"Hello"}"#)
            .await;

        assert!(matches!(reply, Some(ServerFrame::Error { .. })));
    }

    #[tokio::test]
    async fn test_malformed_frame_is_an_error_frame() {
        let chat = coordinator().await;
        let (session, _inbox) = ChatSession::open(chat, None);

        let reply = session.handle_text("{not json").await;

        assert!(matches!(reply, Some(ServerFrame::Error { .. })));
    }

    #[tokio::test]
    async fn test_close_leaves_every_room() {
        let chat = coordinator().await;
        let (watcher, mut watcher_inbox) = ChatSession::open(Arc::clone(&chat), None);
        watcher.handle(join("Dana")).await.unwrap();
        watcher_inbox.recv().await.unwrap();

        let (session, _inbox) = ChatSession::open(Arc::clone(&chat), None);
        session.handle(join("Ana")).await.unwrap();
        watcher_inbox.recv().await.unwrap();

        session.close().await;

        assert_eq!(watcher_inbox.recv().await.unwrap().text, "Ana left the chat");
        assert_eq!(chat.members(&Protocol::new(ROOM)).await, 1);
        assert_eq!(chat.connections(), 1);
    }

    /// Store that takes a while to append each message.
    struct SlowAppendStore {
        inner: InMemoryTicketStore,
        delay: Duration,
    }

    impl TicketStore for SlowAppendStore {
        fn insert_ticket(&self, ticket: NewTicket) -> BoxFuture<'_, Result<Ticket>> {
            self.inner.insert_ticket(ticket)
        }
        fn find_ticket<'a>(&'a self, protocol: &'a Protocol) -> BoxFuture<'a, Result<Option<Ticket>>> {
            self.inner.find_ticket(protocol)
        }
        fn list_tickets(&self) -> BoxFuture<'_, Result<Vec<Ticket>>> {
            self.inner.list_tickets()
        }
        fn apply<'a>(
            &'a self,
            protocol: &'a Protocol,
            command: TicketCommand,
            now: DateTime<Utc>,
        ) -> BoxFuture<'a, Result<Applied>> {
            self.inner.apply(protocol, command, now)
        }
        fn append_message(&self, message: NewMessage) -> BoxFuture<'_, Result<Message>> {
            Box::pin(async move {
                tokio::time::sleep(self.delay).await;
                self.inner.append_message(message).await
            })
        }
        fn messages<'a>(&'a self, protocol: &'a Protocol) -> BoxFuture<'a, Result<Vec<Message>>> {
            self.inner.messages(protocol)
        }
    }

    async fn slow_coordinator() -> (Arc<SlowAppendStore>, Arc<ChatCoordinator>) {
        let store = Arc::new(SlowAppendStore {
            inner: InMemoryTicketStore::new(),
            delay: Duration::from_millis(100),
        });
        store.insert_ticket(fixtures::new_ticket(ROOM)).await.unwrap();
        let clock: Arc<dyn Clock> = Arc::new(test_clock());
        (store.clone(), Arc::new(ChatCoordinator::new(store, clock)))
    }

    fn text_frames(frames: &[&str]) -> impl Stream<Item = std::result::Result<WsMessage, axum::Error>> + Unpin {
        let frames: Vec<_> = frames.iter().map(|f| Ok::<_, axum::Error>(WsMessage::Text((*f).to_string()))).collect();
        futures::stream::iter(frames).chain(futures::stream::pending())
    }

    /// Read `frames` and raise `shutdown` after `after`, as when the socket
    /// write side fails mid-frame.
    async fn read_until_shutdown(session: &ChatSession, frames: &[&str], after: Duration) {
        let shutdown = Notify::new();
        let (errors, _error_rx) = unbounded_channel();
        let stop = async {
            tokio::time::sleep(after).await;
            shutdown.notify_one();
        };

        tokio::time::timeout(
            Duration::from_secs(2),
            async { tokio::join!(read_frames(session, text_frames(frames), &shutdown, &errors), stop) },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_mid_send_still_stores_the_message() {
        let (store, chat) = slow_coordinator().await;
        let (session, _inbox) = ChatSession::open(Arc::clone(&chat), None);

        // Join takes 100ms, the message another 100ms; shutdown lands during the message.
        read_until_shutdown(
            &session,
            &[
                r#"{"type":"join","username":"Ana","room":"TICKET-20250101090000"}"#,
                r#"{"type":"message","room":"TICKET-20250101090000","author":"Ana","text":"Hello"}"#,
            ],
            Duration::from_millis(150),
        )
        .await;

        let chat_messages: Vec<_> = store
            .messages(&Protocol::new(ROOM))
            .await
            .unwrap()
            .into_iter()
            .filter(|m| m.kind == MessageKind::Chat)
            .map(|m| m.content)
            .collect();
        assert_eq!(chat_messages, vec!["Hello".to_string()]);
    }

    #[tokio::test]
    async fn test_shutdown_mid_join_leaves_no_orphan_member() {
        let (store, chat) = slow_coordinator().await;
        let (session, _inbox) = ChatSession::open(Arc::clone(&chat), None);

        read_until_shutdown(
            &session,
            &[r#"{"type":"join","username":"Ana","room":"TICKET-20250101090000"}"#],
            Duration::from_millis(50),
        )
        .await;
        session.close().await;

        assert_eq!(chat.members(&Protocol::new(ROOM)).await, 0);
        assert_eq!(chat.connections(), 0);
        let log: Vec<_> = store
            .messages(&Protocol::new(ROOM))
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(log, vec!["Ana entered the chat".to_string(), "Ana left the chat".to_string()]);
    }
}
