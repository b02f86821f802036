//! Client configuration.

use std::time::Duration;

/// Configuration for a [`crate::session::ChatSession`].
///
/// `ws_base_url` is the WebSocket endpoint; the user id is appended as a
/// query parameter when dialing (`{ws_base_url}?userId={userId}`).
/// `api_base_url` is the REST collaborator prefix, e.g.
/// `http://host/api/v1`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub ws_base_url: String,
    pub api_base_url: String,
    /// Fixed delay before a reconnect attempt after an unintended close.
    pub reconnect_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_base_url: "ws://127.0.0.1:8080/ws".to_string(),
            api_base_url: "http://127.0.0.1:8080/api/v1".to_string(),
            reconnect_delay: Duration::from_millis(1000),
        }
    }
}
