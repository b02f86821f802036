//! The session object tying the realtime subsystem together.
//!
//! One [`ChatSession`] exists per logged-in user and owns the connection
//! manager, the subscription table, the conversation store and the two
//! loops that feed it: a demux loop decoding raw frames into events, and
//! the router task applying events to state. Nothing here lives in
//! globals; the session's lifecycle (create at login, disconnect at
//! logout) is the caller's contract.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, mpsc};

use crate::api::HistoryLoader;
use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::error::ClientError;
use crate::protocol::{Frame, decode_frame};
use crate::router::MessageRouter;
use crate::state::{ChatStore, Identity, Room};
use crate::subscription::{EventSender, SubscriptionManager};
use crate::transport::Transport;

pub struct ChatSession {
    connection: ConnectionManager,
    subscriptions: Arc<Mutex<SubscriptionManager>>,
    store: ChatStore,
    history: Arc<dyn HistoryLoader>,
    events_tx: EventSender,
    identity: Mutex<Option<Identity>>,
}

impl ChatSession {
    /// Build a session and spawn its router task. Must be called from
    /// within a tokio runtime.
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        history: Arc<dyn HistoryLoader>,
    ) -> Self {
        let connection = ConnectionManager::new(config, transport);
        let subscriptions = Arc::new(Mutex::new(SubscriptionManager::new(connection.clone())));
        let store = ChatStore::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        tokio::spawn(MessageRouter::new(store.clone()).run(events_rx));

        Self {
            connection,
            subscriptions,
            store,
            history,
            events_tx,
            identity: Mutex::new(None),
        }
    }

    /// The conversation state handle (rooms, selection, messages).
    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.connection.state().await
    }

    /// Seed the room list from the REST API at session start.
    pub async fn seed_rooms(&self, rooms: Vec<Room>) {
        self.store.set_rooms(rooms).await;
    }

    /// Connect as `identity` and establish the notification subscription.
    ///
    /// Safe to call again on an existing session: the connection manager
    /// reuses an open connection, and the notification subscribe is
    /// idempotent.
    pub async fn connect(&self, identity: Identity) -> Result<(), ClientError> {
        let user_id = identity.user_id;
        *self.identity.lock().await = Some(identity);

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();
        self.spawn_demux_loop(inbound_rx);
        self.connection.connect(user_id, inbound_tx).await?;

        self.subscriptions
            .lock()
            .await
            .subscribe_notification(user_id, self.events_tx.clone())
            .await
    }

    /// Switch the active room: unsubscribe the previous room, backfill the
    /// target room's history, mark it selected, then subscribe its topic.
    ///
    /// History is loaded before the subscription so the room state is
    /// seeded before any live event is trusted.
    pub async fn select_room(&self, room_id: u64) -> Result<(), ClientError> {
        let mut subscriptions = self.subscriptions.lock().await;
        subscriptions.unsubscribe_chat_room().await;

        let messages = self.history.recent_messages(room_id).await?;
        if !self.store.replace_history(room_id, messages).await {
            return Err(ClientError::UnknownRoom(room_id));
        }
        self.store.select(room_id).await;

        subscriptions
            .subscribe_chat_room(room_id, self.events_tx.clone())
            .await
    }

    /// Leave the active room: unsubscribe its topic and clear selection.
    pub async fn leave_room(&self) {
        self.subscriptions.lock().await.unsubscribe_chat_room().await;
        self.store.clear_selection().await;
    }

    /// Publish a chat message to the selected room.
    ///
    /// Requires an identity and a selected room. Fails (rather than
    /// queueing) while the connection is not open.
    pub async fn send_message(&self, text: impl Into<String>) -> Result<(), ClientError> {
        let identity = self
            .identity
            .lock()
            .await
            .clone()
            .ok_or(ClientError::NoIdentity)?;
        let room_id = self
            .store
            .selected_room_id()
            .await
            .ok_or(ClientError::NoRoomSelected)?;

        let frame = Frame::NewMessage {
            room_id,
            user_id: identity.user_id,
            sender_name: identity.nickname,
            message: text.into(),
            sent_at: Some(Utc::now()),
        };
        self.subscriptions.lock().await.publish(&frame).await
    }

    /// Intentional teardown (logout, unmount). Idempotent.
    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
        self.subscriptions.lock().await.reset();
        *self.identity.lock().await = None;
    }

    /// Decode loop: raw frames from the connection are decoded and handed
    /// to the subscription demux. A malformed frame is logged and dropped;
    /// processing of subsequent frames continues.
    fn spawn_demux_loop(&self, mut inbound: mpsc::UnboundedReceiver<String>) {
        let subscriptions = self.subscriptions.clone();
        tokio::spawn(async move {
            while let Some(raw) = inbound.recv().await {
                match decode_frame(&raw) {
                    Ok(frame) => subscriptions.lock().await.route(frame),
                    Err(e) => tracing::warn!("malformed frame dropped: {}", e),
                }
            }
            tracing::debug!("inbound channel closed; demux loop stopped");
        });
    }
}
