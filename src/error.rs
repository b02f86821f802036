//! Error types for the realtime chat client.

use thiserror::Error;

/// Errors raised by the realtime subsystem.
///
/// None of these are fatal to the process: transport failures heal through
/// the reconnect cycle, and precondition violations are reported as values.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure while dialing or talking to the server.
    #[error("connection error: {0}")]
    Connection(String),

    /// An operation required an open connection but none exists.
    #[error("connection is not open")]
    NotConnected,

    /// `subscribe_chat_room` was called while another room subscription is
    /// still active. The caller must unsubscribe explicitly first.
    #[error("room {0} is still subscribed; unsubscribe before switching")]
    RoomAlreadySubscribed(u64),

    /// The requested room is not present in the local room list.
    #[error("unknown room {0}")]
    UnknownRoom(u64),

    /// The session has no identity yet (connect before sending).
    #[error("no identity registered for this session")]
    NoIdentity,

    /// A message was sent without an active room selection.
    #[error("no room selected")]
    NoRoomSelected,

    /// An outbound frame could not be serialized.
    #[error("failed to serialize frame: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A REST collaborator call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors from the REST collaborator (history backfill, session seeding).
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP transport or status failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered but reported a non-success `result`.
    #[error("server reported failure: {0}")]
    Failed(String),
}
