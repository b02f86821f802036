//! Client-held conversation state.
//!
//! [`ChatStore`] is a cloneable handle over the session's room list and
//! room selection. The [`crate::router::MessageRouter`] task is the single
//! writer; every other component reads snapshots. All message-list updates
//! happen inside one write lock, so two inbound events can never interleave
//! and lose an append.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// One chat message. Immutable once constructed; ordering within a room is
/// arrival order, never timestamp order.
///
/// `id` and `sent_at` are optional because live frames omit them while the
/// history endpoint may carry them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub room_id: u64,
    pub user_id: u64,
    pub sender_name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

/// A chat room held in memory for the session.
///
/// `messages` is append-only while the room is live and replaced wholesale
/// when history is reloaded on a room switch. Rooms are never evicted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl Room {
    /// A freshly created room with no backfilled history yet.
    pub fn empty(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            messages: Vec::new(),
        }
    }
}

/// The local user, as returned by `GET /auth/get-my-info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: u64,
    pub nickname: String,
    #[serde(default)]
    pub status_text: String,
}

/// A friend list entry, seeded once at session start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    pub id: u64,
    pub nickname: String,
    #[serde(default)]
    pub status_text: String,
}

/// Snapshot of the session's conversation state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    pub rooms: Vec<Room>,
    /// Id of the currently selected room, if any.
    pub selected_room: Option<u64>,
}

/// Shared handle over [`ChatState`].
#[derive(Debug, Clone, Default)]
pub struct ChatStore {
    inner: Arc<RwLock<ChatState>>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> ChatState {
        self.inner.read().await.clone()
    }

    pub async fn rooms(&self) -> Vec<Room> {
        self.inner.read().await.rooms.clone()
    }

    /// The first room with the given id, if present. Duplicate ids can
    /// exist when the server delivers an INVITE twice; no client-side
    /// dedupe is performed.
    pub async fn room(&self, room_id: u64) -> Option<Room> {
        self.inner
            .read()
            .await
            .rooms
            .iter()
            .find(|room| room.id == room_id)
            .cloned()
    }

    pub async fn selected_room_id(&self) -> Option<u64> {
        self.inner.read().await.selected_room
    }

    pub async fn selected_room(&self) -> Option<Room> {
        let state = self.inner.read().await;
        let selected = state.selected_room?;
        state.rooms.iter().find(|room| room.id == selected).cloned()
    }

    /// Replace the whole room list, e.g. from `GET /chat/get-joined-rooms`
    /// at session start.
    pub async fn set_rooms(&self, rooms: Vec<Room>) {
        self.inner.write().await.rooms = rooms;
    }

    /// Append a room to the list. INVITE delivery has no dedupe key, so a
    /// repeated INVITE for the same id produces a duplicate entry.
    pub async fn add_room(&self, room: Room) {
        self.inner.write().await.rooms.push(room);
    }

    /// Mark a room as selected. Returns `false` (selection unchanged) when
    /// the id is not in the room list.
    pub async fn select(&self, room_id: u64) -> bool {
        let mut state = self.inner.write().await;
        if !state.rooms.iter().any(|room| room.id == room_id) {
            return false;
        }
        state.selected_room = Some(room_id);
        true
    }

    pub async fn clear_selection(&self) {
        self.inner.write().await.selected_room = None;
    }

    /// Append a live message to the selected room.
    ///
    /// Returns `false` without touching any state when the message targets
    /// a room other than the selected one — such messages are dropped, and
    /// history backfill is authoritative on the next room switch. The read
    /// and the append happen under a single write lock, so a concurrently
    /// arriving message cannot clobber this one.
    pub async fn append_message(&self, message: ChatMessage) -> bool {
        let mut state = self.inner.write().await;
        if state.selected_room != Some(message.room_id) {
            return false;
        }
        let Some(room) = state.rooms.iter_mut().find(|room| room.id == message.room_id) else {
            return false;
        };
        room.messages.push(message);
        true
    }

    /// Replace a room's message list wholesale with REST-sourced history.
    /// Returns `false` when the room is unknown.
    pub async fn replace_history(&self, room_id: u64, messages: Vec<ChatMessage>) -> bool {
        let mut state = self.inner.write().await;
        let Some(room) = state.rooms.iter_mut().find(|room| room.id == room_id) else {
            return false;
        };
        room.messages = messages;
        true
    }
}
