//! Realtime delivery subsystem for the OpenChat service.
//!
//! This crate implements the client side of OpenChat's realtime messaging:
//! a single WebSocket connection per session, logical topic subscriptions
//! multiplexed over it, and a router that applies inbound events to
//! client-held conversation state. REST endpoints (history backfill,
//! session seeding) are consumed through [`api::RestClient`].
//!
//! The entry point is [`session::ChatSession`], which owns the connection,
//! the subscription table and the routing loop for one logged-in user.

pub mod api;
pub mod config;
pub mod connection;
pub mod error;
pub mod logger;
pub mod protocol;
pub mod router;
pub mod session;
pub mod state;
pub mod subscription;
pub mod transport;

pub use config::ClientConfig;
pub use error::{ApiError, ClientError};
pub use session::ChatSession;
