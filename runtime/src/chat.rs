//! Chat Room Coordinator.
//!
//! Every ticket has a room keyed by its protocol. A room holds the connections
//! that joined it, each with an unbounded outbox the connection's socket task
//! drains.
//!
//! # Ordering
//!
//! Each room has its own async mutex. Persisting a message and fanning it out
//! to the members happen under that mutex, so within a room the order
//! messages arrive is the order they are stored is the order every member
//! receives them. Ticket writes that record messages go through
//! [`ChatCoordinator::commit_and_publish`] and take the same mutex. Rooms
//! never wait on each other.
//!
//! # Lifecycle
//!
//! A connection is `Disconnected -> Joined -> Disconnected` per room. Closing
//! the socket is an implicit leave of every joined room, recorded like an
//! explicit one. Empty rooms are removed; a room being removed is marked
//! closed first so a concurrent join retries on a fresh room instead of
//! joining an orphan.

use crate::metrics::ChatMetrics;
use chrono::{DateTime, Utc};
use helpdesk_core::environment::Clock;
use helpdesk_core::store::{Applied, TicketStore};
use helpdesk_core::{HelpdeskError, Message, MessageKind, NewMessage, Protocol, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Handle of one realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What every room member receives.
///
/// Mirrors the inbound chat payload (`room`, `author`, `text`) plus the
/// server timestamp and the system flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatBroadcast {
    /// Room (ticket protocol).
    pub room: Protocol,
    /// Author label.
    pub author: String,
    /// Message body.
    pub text: String,
    /// Origin of the message.
    pub kind: MessageKind,
    /// `true` for joins, leaves, status changes and internal comments.
    pub is_system: bool,
    /// Server timestamp.
    pub sent_at: DateTime<Utc>,
    /// Persisted message id.
    pub message_id: i64,
}

impl From<&Message> for ChatBroadcast {
    fn from(message: &Message) -> Self {
        Self {
            room: message.ticket_protocol.clone(),
            author: message.author.clone(),
            text: message.content.clone(),
            kind: message.kind,
            is_system: message.is_system(),
            sent_at: message.sent_at,
            message_id: message.id,
        }
    }
}

#[derive(Debug)]
struct Member {
    display_name: String,
    outbox: UnboundedSender<ChatBroadcast>,
}

#[derive(Debug, Default)]
struct Room {
    members: HashMap<ConnectionId, Member>,
    closed: bool,
}

impl Room {
    /// Deliver to every member. Members whose outbox is closed are dropped.
    fn broadcast(&mut self, message: &Message) -> usize {
        let payload = ChatBroadcast::from(message);
        let mut gone = Vec::new();

        for (id, member) in &self.members {
            if member.outbox.send(payload.clone()).is_err() {
                gone.push(*id);
            }
        }
        for id in &gone {
            self.members.remove(id);
            tracing::debug!(connection = %id, room = %message.ticket_protocol, "Pruned closed outbox");
        }

        self.members.len()
    }
}

#[derive(Debug)]
struct Connection {
    outbox: UnboundedSender<ChatBroadcast>,
    rooms: HashSet<Protocol>,
}

/// Owns room membership and every chat write.
pub struct ChatCoordinator {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
    rooms: RwLock<HashMap<Protocol, Arc<Mutex<Room>>>>,
    connections: StdMutex<HashMap<ConnectionId, Connection>>,
    next_connection: AtomicU64,
}

impl ChatCoordinator {
    /// Create a coordinator writing through `store`.
    #[must_use]
    pub fn new(store: Arc<dyn TicketStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            rooms: RwLock::new(HashMap::new()),
            connections: StdMutex::new(HashMap::new()),
            next_connection: AtomicU64::new(1),
        }
    }

    /// Allocate a connection handle and the receiver its socket drains.
    pub fn connect(&self) -> (ConnectionId, UnboundedReceiver<ChatBroadcast>) {
        let id = ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed));
        let (outbox, inbox) = unbounded_channel();

        self.connections_guard().insert(
            id,
            Connection {
                outbox,
                rooms: HashSet::new(),
            },
        );
        ChatMetrics::connection_opened();
        tracing::debug!(connection = %id, "Chat connection opened");

        (id, inbox)
    }

    /// Join `protocol`'s room as `display_name`.
    ///
    /// Records `"<name> entered the chat"` and broadcasts it to every member,
    /// the joiner included. Joining twice keeps one membership and records
    /// the event again.
    ///
    /// # Errors
    ///
    /// - [`HelpdeskError::Validation`] if the display name is empty
    /// - [`HelpdeskError::NotFound`] if the connection or ticket does not exist
    /// - [`HelpdeskError::Database`] if the event cannot be stored (membership is rolled back)
    #[tracing::instrument(skip_all, fields(connection = %connection, room = %protocol))]
    pub async fn join(
        &self,
        connection: ConnectionId,
        protocol: &Protocol,
        display_name: &str,
    ) -> Result<Message> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(HelpdeskError::Validation("display name is required".to_string()));
        }

        let outbox = self.outbox(connection)?;
        if self.store.find_ticket(protocol).await?.is_none() {
            return Err(HelpdeskError::ticket_not_found(protocol.as_str()));
        }

        let (handle, mut room) = self.lock_open_room(protocol).await;

        // Record the room on the connection first so a disconnect always sees it.
        let listed = self
            .connections_guard()
            .get_mut(&connection)
            .map(|entry| !entry.rooms.insert(protocol.clone()));
        let Some(already_listed) = listed else {
            self.release_room(protocol, &handle, room).await;
            return Err(HelpdeskError::NotFound {
                resource: "connection",
                key: connection.to_string(),
            });
        };

        let previous = room.members.insert(
            connection,
            Member {
                display_name: display_name.to_string(),
                outbox,
            },
        );

        let event = NewMessage::event(
            protocol.clone(),
            format!("{display_name} entered the chat"),
            self.clock.now(),
        );
        let message = match self.store.append_message(event).await {
            Ok(message) => message,
            Err(error) => {
                match previous {
                    Some(previous) => {
                        room.members.insert(connection, previous);
                    },
                    None => {
                        room.members.remove(&connection);
                        if !already_listed {
                            if let Some(entry) = self.connections_guard().get_mut(&connection) {
                                entry.rooms.remove(protocol);
                            }
                        }
                    },
                }
                self.release_room(protocol, &handle, room).await;
                return Err(error);
            },
        };

        room.broadcast(&message);
        drop(room);

        ChatMetrics::record_join();
        tracing::info!(display_name, "Joined chat room");
        Ok(message)
    }

    /// Leave `protocol`'s room.
    ///
    /// Records `"<name> left the chat"` and broadcasts it to the remaining
    /// members. Returns `None` if the connection was not a member.
    ///
    /// # Errors
    ///
    /// Returns [`HelpdeskError::Database`] if the event cannot be stored. The
    /// membership is removed regardless.
    #[tracing::instrument(skip_all, fields(connection = %connection, room = %protocol))]
    pub async fn leave(&self, connection: ConnectionId, protocol: &Protocol) -> Result<Option<Message>> {
        if let Some(entry) = self.connections_guard().get_mut(&connection) {
            entry.rooms.remove(protocol);
        }

        let Some(room_handle) = self.room(protocol).await else {
            return Ok(None);
        };

        let mut room = Arc::clone(&room_handle).lock_owned().await;
        let Some(member) = room.members.remove(&connection) else {
            return Ok(None);
        };

        let event = NewMessage::event(
            protocol.clone(),
            format!("{} left the chat", member.display_name),
            self.clock.now(),
        );
        let result = self.store.append_message(event).await;
        if let Ok(message) = &result {
            room.broadcast(message);
        }
        self.release_room(protocol, &room_handle, room).await;

        tracing::info!(display_name = %member.display_name, "Left chat room");
        result.map(Some)
    }

    /// Tear a connection down, leaving every room it joined.
    ///
    /// Failures to record individual leave events are logged.
    pub async fn disconnect(&self, connection: ConnectionId) {
        let rooms = self
            .connections_guard()
            .get(&connection)
            .map(|c| c.rooms.iter().cloned().collect::<Vec<_>>())
            .unwrap_or_default();

        for protocol in rooms {
            if let Err(error) = self.leave(connection, &protocol).await {
                tracing::warn!(
                    connection = %connection,
                    room = %protocol,
                    error = %error,
                    "Failed to record implicit leave"
                );
            }
        }

        if self.connections_guard().remove(&connection).is_some() {
            ChatMetrics::connection_closed();
            tracing::debug!(connection = %connection, "Chat connection closed");
        }
    }

    /// Send a chat message to `protocol`'s room.
    ///
    /// The message is stored, then delivered to every member including the
    /// sender.
    ///
    /// # Errors
    ///
    /// - [`HelpdeskError::Validation`] if the text is blank
    /// - [`HelpdeskError::NotMember`] if the connection has not joined the room
    /// - [`HelpdeskError::Database`] if the message cannot be stored (nothing is broadcast)
    #[tracing::instrument(skip_all, fields(connection = %connection, room = %protocol))]
    pub async fn send(
        &self,
        connection: ConnectionId,
        protocol: &Protocol,
        author: &str,
        text: &str,
    ) -> Result<Message> {
        if text.trim().is_empty() {
            return Err(HelpdeskError::Validation("message text is required".to_string()));
        }

        let not_member = || HelpdeskError::NotMember {
            room: protocol.to_string(),
        };
        let room = self.room(protocol).await.ok_or_else(not_member)?;
        let mut room = room.lock().await;

        let author = match room.members.get(&connection) {
            Some(_) if !author.trim().is_empty() => author.trim().to_string(),
            Some(member) => member.display_name.clone(),
            None => return Err(not_member()),
        };

        let message = self
            .store
            .append_message(NewMessage {
                ticket_protocol: protocol.clone(),
                author,
                content: text.to_string(),
                sent_at: self.clock.now(),
                kind: MessageKind::Chat,
            })
            .await?;

        let delivered = room.broadcast(&message);
        ChatMetrics::record_message();
        tracing::debug!(message_id = message.id, delivered, "Chat message broadcast");

        Ok(message)
    }

    /// Run a ticket write under `protocol`'s room lock and broadcast the
    /// messages it stored before releasing the lock.
    ///
    /// Chat sends to the room wait for the write, so members receive the
    /// write's messages in the order they were stored.
    ///
    /// # Errors
    ///
    /// Whatever `commit` fails with. Nothing is broadcast then.
    pub async fn commit_and_publish<F, Fut>(&self, protocol: &Protocol, commit: F) -> Result<Applied>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Applied>>,
    {
        let (handle, mut room) = self.lock_open_room(protocol).await;

        let result = commit().await;
        if let Ok(applied) = &result {
            for message in &applied.messages {
                room.broadcast(message);
            }
        }

        self.release_room(protocol, &handle, room).await;
        result
    }

    /// Number of members currently in `protocol`'s room.
    pub async fn members(&self, protocol: &Protocol) -> usize {
        match self.room(protocol).await {
            Some(room) => room.lock().await.members.len(),
            None => 0,
        }
    }

    /// Number of open connections.
    #[must_use]
    pub fn connections(&self) -> usize {
        self.connections_guard().len()
    }

    fn connections_guard(&self) -> std::sync::MutexGuard<'_, HashMap<ConnectionId, Connection>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn outbox(&self, connection: ConnectionId) -> Result<UnboundedSender<ChatBroadcast>> {
        self.connections_guard()
            .get(&connection)
            .map(|c| c.outbox.clone())
            .ok_or_else(|| HelpdeskError::NotFound {
                resource: "connection",
                key: connection.to_string(),
            })
    }

    /// Lock `protocol`'s room, creating it if needed. Never returns a room
    /// that is being removed.
    async fn lock_open_room(&self, protocol: &Protocol) -> (Arc<Mutex<Room>>, OwnedMutexGuard<Room>) {
        loop {
            let handle = self.room_or_create(protocol).await;
            let room = Arc::clone(&handle).lock_owned().await;
            if !room.closed {
                return (handle, room);
            }
            drop(room);
            self.remove_room(protocol, &handle).await;
        }
    }

    /// Unlock a room, removing it if nobody is left in it.
    async fn release_room(&self, protocol: &Protocol, handle: &Arc<Mutex<Room>>, mut room: OwnedMutexGuard<Room>) {
        let empty = room.members.is_empty();
        if empty {
            room.closed = true;
        }
        drop(room);
        if empty {
            self.remove_room(protocol, handle).await;
        }
    }

    async fn room(&self, protocol: &Protocol) -> Option<Arc<Mutex<Room>>> {
        self.rooms.read().await.get(protocol).cloned()
    }

    async fn room_or_create(&self, protocol: &Protocol) -> Arc<Mutex<Room>> {
        if let Some(room) = self.room(protocol).await {
            return room;
        }
        let mut rooms = self.rooms.write().await;
        Arc::clone(rooms.entry(protocol.clone()).or_default())
    }

    async fn remove_room(&self, protocol: &Protocol, closed: &Arc<Mutex<Room>>) {
        let mut rooms = self.rooms.write().await;
        if rooms.get(protocol).is_some_and(|current| Arc::ptr_eq(current, closed)) {
            rooms.remove(protocol);
        }
    }
}

impl fmt::Debug for ChatCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatCoordinator")
            .field("connections", &self.connections())
            .finish_non_exhaustive()
    }
}
