//! REST collaborator surface.
//!
//! The realtime core only depends on [`HistoryLoader`]: the bounded
//! history backfill consulted on every room switch before live events are
//! trusted. [`RestClient`] implements it against the chat service, and
//! additionally exposes the session-seeding endpoints (identity, friend
//! list, joined rooms) consumed once at startup.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::state::{ChatMessage, Friend, Identity, Room};

const RESULT_SUCCESS: &str = "SUCCESS";

/// Source of a room's recent message history (newest-last, capped at 100
/// entries server-side).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryLoader: Send + Sync {
    async fn recent_messages(&self, room_id: u64) -> Result<Vec<ChatMessage>, ApiError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatHistoryResponse {
    result: String,
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinedRoomsResponse {
    result: String,
    #[serde(default)]
    room_list: Vec<Room>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FriendListResponse {
    result: String,
    #[serde(default)]
    friend_list: Vec<Friend>,
}

/// HTTP client for the chat service's REST API.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    /// `GET /auth/get-my-info` — the local user's identity.
    pub async fn my_info(&self) -> Result<Identity, ApiError> {
        self.get_json("/auth/get-my-info").await
    }

    /// `GET /user/get-friendList` — the friend list, seeded once at
    /// session start.
    pub async fn friend_list(&self) -> Result<Vec<Friend>, ApiError> {
        let response: FriendListResponse = self.get_json("/user/get-friendList").await?;
        ensure_success(&response.result)?;
        Ok(response.friend_list)
    }

    /// `GET /chat/get-joined-rooms` — rooms the user participates in.
    pub async fn joined_rooms(&self) -> Result<Vec<Room>, ApiError> {
        let response: JoinedRoomsResponse = self.get_json("/chat/get-joined-rooms").await?;
        ensure_success(&response.result)?;
        Ok(response.room_list)
    }
}

#[async_trait]
impl HistoryLoader for RestClient {
    /// `GET /chat/rooms/{roomId}/messages` — called on every room switch.
    async fn recent_messages(&self, room_id: u64) -> Result<Vec<ChatMessage>, ApiError> {
        let response: ChatHistoryResponse = self
            .get_json(&format!("/chat/rooms/{room_id}/messages"))
            .await?;
        ensure_success(&response.result)?;
        Ok(response.messages)
    }
}

fn ensure_success(result: &str) -> Result<(), ApiError> {
    if result == RESULT_SUCCESS {
        Ok(())
    } else {
        Err(ApiError::Failed(result.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_response_deserializes_wire_casing() {
        let raw = r#"{
            "result": "SUCCESS",
            "messages": [
                {"roomId": 4, "userId": 2, "senderName": "alice", "message": "m1"},
                {"id": 11, "roomId": 4, "userId": 5, "senderName": "bob", "message": "m2",
                 "sentAt": "2026-08-27T10:00:00Z"}
            ]
        }"#;

        let response: ChatHistoryResponse = serde_json::from_str(raw).unwrap();

        assert_eq!(response.result, RESULT_SUCCESS);
        assert_eq!(response.messages.len(), 2);
        assert_eq!(response.messages[0].sender_name, "alice");
        assert_eq!(response.messages[0].id, None);
        assert_eq!(response.messages[1].id, Some(11));
        assert!(response.messages[1].sent_at.is_some());
    }

    #[test]
    fn joined_rooms_response_deserializes() {
        let raw = r#"{"result": "SUCCESS", "roomList": [{"id": 3, "name": "Team", "messages": []}]}"#;

        let response: JoinedRoomsResponse = serde_json::from_str(raw).unwrap();

        assert_eq!(response.room_list.len(), 1);
        assert_eq!(response.room_list[0].name, "Team");
    }

    #[test]
    fn non_success_result_is_a_failure_value() {
        let result = ensure_success("ROOM_NOT_FOUND");

        assert!(matches!(result, Err(ApiError::Failed(reason)) if reason == "ROOM_NOT_FOUND"));
    }
}
