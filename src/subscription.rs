//! Logical topic subscriptions multiplexed over the one connection.
//!
//! A session holds exactly one notification subscription (long-lived) and
//! at most one room subscription at a time. Switching rooms is an explicit
//! unsubscribe-then-subscribe; the manager deliberately refuses to
//! auto-unsubscribe so the transition stays observable to the caller.

use tokio::sync::mpsc;

use crate::connection::ConnectionManager;
use crate::error::ClientError;
use crate::protocol::{ControlFrame, Frame, Topic};

/// Destination channel for events routed to a subscription. Both
/// subscriptions typically clone one sender feeding the router task.
pub type EventSender = mpsc::UnboundedSender<Frame>;

struct RoomSubscription {
    room_id: u64,
    events: EventSender,
}

/// Tracks the session's active topic subscriptions and issues the
/// subscribe/unsubscribe control frames for them.
///
/// Holds a cloned [`ConnectionManager`] handle — shared access to the same
/// connection, never a second socket.
pub struct SubscriptionManager {
    connection: ConnectionManager,
    /// Event channel of the long-lived notification subscription.
    notification: Option<EventSender>,
    room: Option<RoomSubscription>,
}

impl SubscriptionManager {
    pub fn new(connection: ConnectionManager) -> Self {
        Self {
            connection,
            notification: None,
            room: None,
        }
    }

    /// Id of the currently subscribed room, if any.
    pub fn active_room(&self) -> Option<u64> {
        self.room.as_ref().map(|sub| sub.room_id)
    }

    pub fn has_notification(&self) -> bool {
        self.notification.is_some()
    }

    /// Establish the personal notification topic. Idempotent: a second
    /// call with a live subscription is a no-op.
    pub async fn subscribe_notification(
        &mut self,
        user_id: u64,
        events: EventSender,
    ) -> Result<(), ClientError> {
        if self.notification.is_some() {
            tracing::debug!("notification subscription already active");
            return Ok(());
        }
        let topic = Topic::Notification { user_id };
        self.connection.send(&ControlFrame::Subscribe { topic }).await?;
        self.notification = Some(events);
        tracing::info!(%topic, "subscribed");
        Ok(())
    }

    /// Subscribe the room topic and record it as the single active room
    /// subscription.
    ///
    /// The caller must have unsubscribed any previous room first; a live
    /// room subscription is a [`ClientError::RoomAlreadySubscribed`].
    pub async fn subscribe_chat_room(
        &mut self,
        room_id: u64,
        events: EventSender,
    ) -> Result<(), ClientError> {
        if let Some(active) = &self.room {
            return Err(ClientError::RoomAlreadySubscribed(active.room_id));
        }
        let topic = Topic::Room { room_id };
        self.connection.send(&ControlFrame::Subscribe { topic }).await?;
        self.room = Some(RoomSubscription { room_id, events });
        tracing::info!(%topic, "subscribed");
        Ok(())
    }

    /// Tear down the active room subscription; no-op when none exists.
    ///
    /// The handler is released unconditionally — even when the unsubscribe
    /// frame cannot be sent (e.g. while disconnected) no further events may
    /// reach a room the UI has left.
    pub async fn unsubscribe_chat_room(&mut self) {
        let Some(sub) = self.room.take() else {
            return;
        };
        let topic = Topic::Room { room_id: sub.room_id };
        if let Err(e) = self.connection.send(&ControlFrame::Unsubscribe { topic }).await {
            tracing::warn!(%topic, "failed to send unsubscribe: {}", e);
        } else {
            tracing::info!(%topic, "unsubscribed");
        }
    }

    /// Publish an outbound event frame through the connection.
    pub async fn publish(&self, frame: &Frame) -> Result<(), ClientError> {
        self.connection.send(frame).await
    }

    /// Drop both subscriptions without issuing control frames. Used on
    /// explicit session teardown, where the connection is gone anyway.
    pub fn reset(&mut self) {
        self.notification = None;
        self.room = None;
    }

    /// Topic demultiplex for one decoded inbound frame.
    ///
    /// `NEW_MESSAGE` targets its room topic; `INVITE`, `ERROR` and unknown
    /// frames arrive on the notification topic. Frames without a matching
    /// live subscription are dropped here.
    pub fn route(&self, frame: Frame) {
        match &frame {
            Frame::NewMessage { room_id, .. } => match &self.room {
                Some(sub) if sub.room_id == *room_id => forward(&sub.events, frame),
                _ => {
                    tracing::debug!(
                        room_id = *room_id,
                        "no active subscription for room topic; dropping frame"
                    );
                }
            },
            Frame::Invite { .. } | Frame::Error { .. } | Frame::Unknown => {
                match &self.notification {
                    Some(events) => forward(events, frame),
                    None => {
                        tracing::debug!("no notification subscription; dropping frame");
                    }
                }
            }
        }
    }
}

fn forward(events: &EventSender, frame: Frame) {
    if events.send(frame).is_err() {
        tracing::warn!("event channel closed; dropping frame");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;
    use crate::config::ClientConfig;
    use crate::transport::testing::{FakeEndpoints, FakeTransport};

    async fn connected_manager() -> (SubscriptionManager, FakeEndpoints) {
        let transport = Arc::new(FakeTransport::new());
        let connection = ConnectionManager::new(ClientConfig::default(), transport.clone());
        let (tx, _rx) = mpsc::unbounded_channel();
        connection.connect(5, tx).await.unwrap();
        let endpoints = transport.take_endpoints(0).await;
        (SubscriptionManager::new(connection), endpoints)
    }

    fn invite(room_id: u64) -> Frame {
        Frame::Invite {
            room_id,
            room_name: "Team".to_string(),
        }
    }

    fn new_message(room_id: u64) -> Frame {
        Frame::NewMessage {
            room_id,
            user_id: 2,
            sender_name: "alice".to_string(),
            message: "hi".to_string(),
            sent_at: None,
        }
    }

    #[tokio::test]
    async fn notification_subscribe_is_idempotent() {
        // given:
        let (mut subscriptions, mut endpoints) = connected_manager().await;
        let (events, _rx) = mpsc::unbounded_channel();

        // when: subscribing twice
        subscriptions.subscribe_notification(5, events.clone()).await.unwrap();
        subscriptions.subscribe_notification(5, events).await.unwrap();

        // then: exactly one SUBSCRIBE control frame went out
        let first = endpoints.sent.recv().await.unwrap();
        assert!(first.contains("notification:5"));
        assert!(endpoints.sent.try_recv().is_err());
    }

    #[tokio::test]
    async fn second_room_subscription_is_refused() {
        let (mut subscriptions, _endpoints) = connected_manager().await;
        let (events, _rx) = mpsc::unbounded_channel();

        subscriptions.subscribe_chat_room(3, events.clone()).await.unwrap();
        let result = subscriptions.subscribe_chat_room(4, events).await;

        assert!(matches!(result, Err(ClientError::RoomAlreadySubscribed(3))));
        assert_eq!(subscriptions.active_room(), Some(3));
    }

    #[tokio::test]
    async fn unsubscribe_releases_the_handler_and_is_idempotent() {
        // given: an active room subscription
        let (mut subscriptions, mut endpoints) = connected_manager().await;
        let (events, mut rx) = mpsc::unbounded_channel();
        subscriptions.subscribe_chat_room(3, events).await.unwrap();
        let _subscribe_frame = endpoints.sent.recv().await.unwrap();

        // when: unsubscribing (twice — the second must be a no-op)
        subscriptions.unsubscribe_chat_room().await;
        subscriptions.unsubscribe_chat_room().await;

        // then: one UNSUBSCRIBE frame, and routed events no longer reach
        // the released handler
        let unsubscribe = endpoints.sent.recv().await.unwrap();
        assert!(unsubscribe.contains("UNSUBSCRIBE"));
        assert!(unsubscribe.contains("room:3"));
        assert!(endpoints.sent.try_recv().is_err());

        subscriptions.route(new_message(3));
        assert!(rx.try_recv().is_err());
        assert_eq!(subscriptions.active_room(), None);
    }

    #[tokio::test]
    async fn route_demultiplexes_by_topic() {
        let (mut subscriptions, _endpoints) = connected_manager().await;
        let (notification_tx, mut notification_rx) = mpsc::unbounded_channel();
        let (room_tx, mut room_rx) = mpsc::unbounded_channel();
        subscriptions.subscribe_notification(5, notification_tx).await.unwrap();
        subscriptions.subscribe_chat_room(3, room_tx).await.unwrap();

        subscriptions.route(invite(9));
        subscriptions.route(new_message(3));

        assert_eq!(notification_rx.try_recv().unwrap(), invite(9));
        assert_eq!(room_rx.try_recv().unwrap(), new_message(3));
    }

    #[tokio::test]
    async fn route_drops_frames_without_a_matching_subscription() {
        let (mut subscriptions, _endpoints) = connected_manager().await;
        let (room_tx, mut room_rx) = mpsc::unbounded_channel();
        subscriptions.subscribe_chat_room(3, room_tx).await.unwrap();

        // a message for a different room and an invite with no
        // notification subscription are both dropped
        subscriptions.route(new_message(7));
        subscriptions.route(invite(9));

        assert!(room_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn room_subscribe_requires_an_open_connection() {
        let transport = Arc::new(FakeTransport::new());
        let connection = ConnectionManager::new(ClientConfig::default(), transport);
        let mut subscriptions = SubscriptionManager::new(connection);
        let (events, _rx) = mpsc::unbounded_channel();

        let result = subscriptions.subscribe_chat_room(3, events).await;

        assert!(matches!(result, Err(ClientError::NotConnected)));
        assert_eq!(subscriptions.active_room(), None);
    }
}
