//! Wire protocol for the realtime channel.
//!
//! Every frame exchanged over the WebSocket is a JSON object. Inbound event
//! frames carry a `type` discriminator and decode into [`Frame`]; outbound
//! subscription control frames carry a `command` discriminator
//! ([`ControlFrame`]). Publishing a chat message reuses the event frame
//! shape, so both directions share [`Frame`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// A logical subscription target multiplexed over the one connection.
///
/// Rendered on the wire as `notification:{userId}` or `room:{roomId}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Per-user notification channel (invites, server errors).
    Notification { user_id: u64 },
    /// Per-room message channel.
    Room { room_id: u64 },
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Notification { user_id } => write!(f, "notification:{user_id}"),
            Topic::Room { room_id } => write!(f, "room:{room_id}"),
        }
    }
}

impl Serialize for Topic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One discrete unit of data on the realtime channel, discriminated by the
/// `type` field.
///
/// An unrecognized `type` decodes to [`Frame::Unknown`] — a value the
/// consumer can log and drop, not a decode failure. Malformed JSON is a
/// [`serde_json::Error`] from [`decode_frame`]; both are dropped per-frame
/// and never tear down the connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// The local user was invited into a room.
    #[serde(rename = "INVITE", rename_all = "camelCase")]
    Invite { room_id: u64, room_name: String },

    /// A chat message published to a room channel.
    #[serde(rename = "NEW_MESSAGE", rename_all = "camelCase")]
    NewMessage {
        room_id: u64,
        /// Id of the sending user.
        user_id: u64,
        sender_name: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sent_at: Option<DateTime<Utc>>,
    },

    /// Server-side error surfaced on the notification channel.
    #[serde(rename = "ERROR")]
    Error {
        #[serde(default)]
        message: String,
    },

    /// Any `type` this client does not understand.
    #[serde(other)]
    Unknown,
}

/// Subscription control frames, client to server only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "UPPERCASE")]
pub enum ControlFrame {
    Subscribe { topic: Topic },
    Unsubscribe { topic: Topic },
}

/// Decode one inbound text frame.
pub fn decode_frame(raw: &str) -> Result<Frame, serde_json::Error> {
    serde_json::from_str(raw)
}
