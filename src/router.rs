//! Applies decoded inbound events to conversation state.
//!
//! The router is the single writer of the [`ChatStore`]: it runs as one
//! task draining one event channel, so all room and message mutations are
//! serialized and concurrent arrivals cannot lose an append. Events are
//! applied in delivery order; nothing is re-sorted or buffered.

use tokio::sync::mpsc;

use crate::protocol::Frame;
use crate::state::{ChatMessage, ChatStore, Room};

pub struct MessageRouter {
    store: ChatStore,
}

impl MessageRouter {
    pub fn new(store: ChatStore) -> Self {
        Self { store }
    }

    /// Consume events until the channel closes.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<Frame>) {
        while let Some(frame) = events.recv().await {
            self.apply(frame).await;
        }
        tracing::debug!("event channel closed; message router stopped");
    }

    /// Apply one decoded event.
    ///
    /// - `INVITE` appends a fresh room entry; there is no dedupe key, so a
    ///   repeated INVITE for the same id yields a duplicate entry.
    /// - `NEW_MESSAGE` is appended only when it targets the selected room;
    ///   otherwise it is dropped, since history backfill is authoritative
    ///   on the next room switch.
    /// - `ERROR` and unknown types are logged and cause no state change.
    pub async fn apply(&self, frame: Frame) {
        match frame {
            Frame::Invite { room_id, room_name } => {
                tracing::info!(room_id, room_name = %room_name, "invited to room");
                self.store.add_room(Room::empty(room_id, room_name)).await;
            }
            Frame::NewMessage {
                room_id,
                user_id,
                sender_name,
                message,
                sent_at,
            } => {
                let applied = self
                    .store
                    .append_message(ChatMessage {
                        id: None,
                        room_id,
                        user_id,
                        sender_name,
                        message,
                        sent_at,
                    })
                    .await;
                if !applied {
                    tracing::debug!(room_id, "message for non-selected room dropped");
                }
            }
            Frame::Error { message } => {
                tracing::error!("server error event: {}", message);
            }
            Frame::Unknown => {
                tracing::error!("unknown message type; frame dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_message(room_id: u64, text: &str) -> Frame {
        Frame::NewMessage {
            room_id,
            user_id: 2,
            sender_name: "alice".to_string(),
            message: text.to_string(),
            sent_at: None,
        }
    }

    #[tokio::test]
    async fn invite_appends_one_room_per_event() {
        let store = ChatStore::new();
        let router = MessageRouter::new(store.clone());

        router
            .apply(Frame::Invite {
                room_id: 9,
                room_name: "Team".to_string(),
            })
            .await;

        let rooms = store.rooms().await;
        assert_eq!(rooms, vec![Room::empty(9, "Team")]);
    }

    #[tokio::test]
    async fn message_for_selected_room_is_appended_in_arrival_order() {
        let store = ChatStore::new();
        store.add_room(Room::empty(5, "a")).await;
        assert!(store.select(5).await);
        let router = MessageRouter::new(store.clone());

        router.apply(new_message(5, "first")).await;
        router.apply(new_message(5, "second")).await;

        let room = store.room(5).await.unwrap();
        assert_eq!(room.messages[0].message, "first");
        assert_eq!(room.messages[1].message, "second");
    }

    #[tokio::test]
    async fn message_for_another_room_does_not_touch_state() {
        // given: room 5 is selected
        let store = ChatStore::new();
        store.add_room(Room::empty(5, "a")).await;
        assert!(store.select(5).await);
        let router = MessageRouter::new(store.clone());

        // when: a message for room 7 arrives
        router.apply(new_message(7, "stray")).await;

        // then: room 5 is untouched and no entry for room 7 appeared
        assert!(store.room(5).await.unwrap().messages.is_empty());
        assert!(store.room(7).await.is_none());
    }

    #[tokio::test]
    async fn error_and_unknown_frames_cause_no_state_change() {
        let store = ChatStore::new();
        store.add_room(Room::empty(5, "a")).await;
        assert!(store.select(5).await);
        let router = MessageRouter::new(store.clone());
        let before = store.snapshot().await;

        router
            .apply(Frame::Error {
                message: "boom".to_string(),
            })
            .await;
        router.apply(Frame::Unknown).await;

        assert_eq!(store.snapshot().await, before);
    }
}
