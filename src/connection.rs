//! Lifecycle of the single realtime connection.
//!
//! [`ConnectionManager`] owns the one physical connection of a session:
//! dialing, the open/closed state machine, reconnection after an unintended
//! close, and the `send` primitive. Inbound frames are forwarded to the
//! registered handler channel; the consumer loop on the other end decodes
//! and routes them, so no callback ever has to be re-bound on reconnect.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::{FrameReceiver, FrameSender, Transport};

/// Connection state machine:
/// `Idle → Connecting → Open → Closed → (reconnect) → Connecting → …`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

/// Destination for raw inbound frames. The session registers one of these
/// and keeps consuming from the paired receiver across reconnects.
pub type InboundHandler = FrameSender;

struct Inner {
    state: ConnectionState,
    user_id: Option<u64>,
    handler: Option<InboundHandler>,
    outbound: Option<FrameSender>,
    should_reconnect: bool,
    reconnect_timer: Option<JoinHandle<()>>,
    /// Bumped on every dial and on explicit disconnect; stale completions
    /// (a slow dial, an old read pump) compare against it and become
    /// no-ops.
    generation: u64,
}

/// Owner of the session's single physical connection.
///
/// Cheap to clone; all clones share the same connection state. Exactly one
/// physical connection is open at any instant regardless of how many times
/// [`ConnectionManager::connect`] is called.
#[derive(Clone)]
pub struct ConnectionManager {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    inner: Arc<Mutex<Inner>>,
}

impl ConnectionManager {
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            inner: Arc::new(Mutex::new(Inner {
                state: ConnectionState::Idle,
                user_id: None,
                handler: None,
                outbound: None,
                should_reconnect: true,
                reconnect_timer: None,
                generation: 0,
            })),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    /// Connect as `user_id`, registering `handler` as the destination for
    /// inbound frames.
    ///
    /// Idempotent: when the connection is already `Open` the handler is
    /// re-registered on it and no new socket is dialed; when a dial is
    /// already in flight the call returns without starting a duplicate.
    /// The handler recorded last always wins, so a handler registered just
    /// before a slow dial completes still receives frames.
    pub async fn connect(
        &self,
        user_id: u64,
        handler: InboundHandler,
    ) -> Result<ConnectionState, ClientError> {
        let generation = {
            let mut inner = self.inner.lock().await;
            inner.user_id = Some(user_id);
            inner.should_reconnect = true;
            inner.handler = Some(handler);

            match inner.state {
                ConnectionState::Open => {
                    tracing::debug!("connection already open; reusing it");
                    return Ok(ConnectionState::Open);
                }
                ConnectionState::Connecting => {
                    tracing::debug!("connection attempt already in flight");
                    return Ok(ConnectionState::Connecting);
                }
                ConnectionState::Idle | ConnectionState::Closed => {
                    inner.state = ConnectionState::Connecting;
                    inner.generation += 1;
                    inner.generation
                }
            }
        };

        let url = format!("{}?userId={}", self.config.ws_base_url, user_id);
        let link = match self.transport.connect(&url).await {
            Ok(link) => link,
            Err(e) => {
                tracing::warn!("websocket dial failed: {}", e);
                self.on_transport_close(generation).await;
                return Err(e);
            }
        };

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            // A disconnect (or a newer dial) raced this one; the fresh
            // link is dropped, which closes it.
            tracing::debug!("connection attempt superseded; discarding link");
            return Ok(inner.state);
        }

        inner.state = ConnectionState::Open;
        inner.outbound = Some(link.outbound);
        drop(inner);

        self.spawn_read_loop(link.inbound, generation);
        tracing::info!(user_id, "websocket connected");
        Ok(ConnectionState::Open)
    }

    /// Explicit, intentional teardown. Idempotent.
    ///
    /// This is the single cancellation point: it clears the pending
    /// reconnect timer, detaches the handler and bumps the generation so
    /// any in-flight completion that fires afterwards is a no-op.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        inner.should_reconnect = false;
        if let Some(timer) = inner.reconnect_timer.take() {
            timer.abort();
        }
        // Dropping the outbound sender ends the write pump and closes the
        // socket, if one is up.
        inner.outbound = None;
        inner.handler = None;
        inner.user_id = None;
        inner.generation += 1;
        inner.state = ConnectionState::Closed;
        tracing::info!("websocket disconnected");
    }

    /// Serialize `payload` and transmit it immediately.
    ///
    /// Fails with [`ClientError::NotConnected`] (plus a warning log) unless
    /// the connection is `Open`. There is no outbound queue: frames sent
    /// while disconnected are dropped rather than buffered as stale intent.
    pub async fn send<T: Serialize>(&self, payload: &T) -> Result<(), ClientError> {
        let inner = self.inner.lock().await;
        if inner.state != ConnectionState::Open {
            tracing::warn!("send failed: connection not open");
            return Err(ClientError::NotConnected);
        }
        let frame = serde_json::to_string(payload)?;
        match inner.outbound.as_ref() {
            Some(outbound) => outbound.send(frame).map_err(|_| ClientError::NotConnected),
            None => Err(ClientError::NotConnected),
        }
    }

    fn spawn_read_loop(&self, mut inbound: FrameReceiver, generation: u64) {
        let manager = self.clone();
        tokio::spawn(async move {
            while let Some(frame) = inbound.recv().await {
                let handler = {
                    let inner = manager.inner.lock().await;
                    if inner.generation != generation {
                        // Superseded by a newer connection; stop quietly.
                        return;
                    }
                    inner.handler.clone()
                };
                match handler {
                    Some(handler) => {
                        if handler.send(frame).is_err() {
                            tracing::warn!("inbound handler dropped; discarding frame");
                        }
                    }
                    None => tracing::debug!("no inbound handler registered; discarding frame"),
                }
            }
            manager.on_transport_close(generation).await;
        });
    }

    /// The close event is authoritative: discard the connection and, when
    /// the close was not requested by the caller and an identity is still
    /// known, schedule a single reconnect after the fixed delay.
    async fn on_transport_close(&self, generation: u64) {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            return;
        }
        tracing::warn!("websocket closed");
        inner.state = ConnectionState::Closed;
        inner.outbound = None;
        if inner.should_reconnect && inner.user_id.is_some() {
            self.schedule_reconnect(&mut inner);
        }
    }

    fn schedule_reconnect(&self, inner: &mut MutexGuard<'_, Inner>) {
        if inner.reconnect_timer.is_some() {
            return;
        }
        let manager = self.clone();
        let delay = self.config.reconnect_delay;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let (user_id, handler) = {
                let mut inner = manager.inner.lock().await;
                inner.reconnect_timer = None;
                if !inner.should_reconnect {
                    return;
                }
                match (inner.user_id, inner.handler.clone()) {
                    (Some(user_id), Some(handler)) => (user_id, handler),
                    _ => return,
                }
            };
            tracing::info!(user_id, "attempting reconnect");
            if let Err(e) = manager.connect(user_id, handler).await {
                tracing::warn!("reconnect attempt failed: {}", e);
            }
        });
        inner.reconnect_timer = Some(timer);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use super::*;
    use crate::protocol::{ControlFrame, Topic};
    use crate::transport::testing::FakeTransport;

    fn manager_with(delay_ms: u64) -> (ConnectionManager, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport::new());
        let config = ClientConfig {
            reconnect_delay: Duration::from_millis(delay_ms),
            ..ClientConfig::default()
        };
        (
            ConnectionManager::new(config, transport.clone()),
            transport,
        )
    }

    fn handler() -> (InboundHandler, FrameReceiver) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn send_before_connect_fails_without_touching_the_transport() {
        let (manager, transport) = manager_with(1000);

        let result = manager
            .send(&ControlFrame::Subscribe {
                topic: Topic::Notification { user_id: 5 },
            })
            .await;

        assert!(matches!(result, Err(ClientError::NotConnected)));
        assert_eq!(transport.connect_count().await, 0);
    }

    #[tokio::test]
    async fn connect_opens_and_sends_serialized_frames() {
        // given:
        let (manager, transport) = manager_with(1000);
        let (tx, _rx) = handler();

        // when: connecting as user 5 and sending a well-formed frame
        let state = manager.connect(5, tx).await.unwrap();
        manager
            .send(&ControlFrame::Subscribe {
                topic: Topic::Notification { user_id: 5 },
            })
            .await
            .unwrap();

        // then: state is Open, the url is scoped by userId and the frame
        // went out on the wire
        assert_eq!(state, ConnectionState::Open);
        assert!(transport.url(0).await.ends_with("?userId=5"));
        let mut endpoints = transport.take_endpoints(0).await;
        let sent = endpoints.sent.recv().await.unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&sent).unwrap(),
            serde_json::json!({"command": "SUBSCRIBE", "topic": "notification:5"})
        );
    }

    #[tokio::test]
    async fn connect_is_idempotent_while_open() {
        let (manager, transport) = manager_with(1000);
        let (tx1, _rx1) = handler();
        let (tx2, _rx2) = handler();

        manager.connect(5, tx1).await.unwrap();
        let state = manager.connect(5, tx2).await.unwrap();

        // one physical connection, not two
        assert_eq!(state, ConnectionState::Open);
        assert_eq!(transport.connect_count().await, 1);
    }

    #[tokio::test]
    async fn frames_reach_the_most_recently_registered_handler() {
        // given: user connects, then re-registers a new handler on the
        // existing connection
        let (manager, transport) = manager_with(1000);
        let (tx1, mut rx1) = handler();
        let (tx2, mut rx2) = handler();
        manager.connect(5, tx1).await.unwrap();
        manager.connect(5, tx2).await.unwrap();

        // when: a frame arrives
        let endpoints = transport.take_endpoints(0).await;
        endpoints.inject.send("{\"type\":\"ERROR\"}".to_string()).unwrap();

        // then: only the newest handler receives it
        let frame = timeout(Duration::from_secs(1), rx2.recv())
            .await
            .expect("frame should be forwarded")
            .unwrap();
        assert_eq!(frame, "{\"type\":\"ERROR\"}");
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn unintended_close_schedules_exactly_one_reconnect() {
        // given: an open connection with a short reconnect delay
        let (manager, transport) = manager_with(50);
        let (tx, _rx) = handler();
        manager.connect(5, tx).await.unwrap();

        // when: the server drops the connection
        drop(transport.take_endpoints(0).await);
        tokio::time::sleep(Duration::from_millis(250)).await;

        // then: exactly one reconnect dial happened, reusing the user id
        assert_eq!(transport.connect_count().await, 2);
        assert!(transport.url(1).await.ends_with("?userId=5"));
        assert_eq!(manager.state().await, ConnectionState::Open);
    }

    #[tokio::test]
    async fn explicit_disconnect_before_the_timer_fires_cancels_reconnect() {
        // given: an unintended close has scheduled a reconnect
        let (manager, transport) = manager_with(100);
        let (tx, _rx) = handler();
        manager.connect(5, tx).await.unwrap();
        drop(transport.take_endpoints(0).await);
        tokio::time::sleep(Duration::from_millis(20)).await;

        // when: the caller disconnects before the delay elapses
        manager.disconnect().await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        // then: zero reconnect attempts
        assert_eq!(transport.connect_count().await, 1);
        assert_eq!(manager.state().await, ConnectionState::Closed);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let (manager, _transport) = manager_with(1000);
        let (tx, _rx) = handler();
        manager.connect(5, tx).await.unwrap();

        manager.disconnect().await;
        manager.disconnect().await;

        assert_eq!(manager.state().await, ConnectionState::Closed);
    }

    #[tokio::test]
    async fn send_after_disconnect_is_refused() {
        let (manager, _transport) = manager_with(1000);
        let (tx, _rx) = handler();
        manager.connect(5, tx).await.unwrap();
        manager.disconnect().await;

        let result = manager
            .send(&ControlFrame::Unsubscribe {
                topic: Topic::Room { room_id: 4 },
            })
            .await;

        assert!(matches!(result, Err(ClientError::NotConnected)));
    }
}
