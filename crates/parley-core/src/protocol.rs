//! Wire shapes for the relay HTTP API
//!
//! Field names mirror the JSON the API speaks (`sessionId`, `isAgent`,
//! `user`/`message`), so these types serialize directly into the contract.

use crate::types::{ChatMessage, Participant};
use serde::{Deserialize, Serialize};

/// Body for `POST /api/sessions` and `POST /api/sessions/find`.
/// Exactly two participants required; `sessionId` makes creation idempotent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub participants: Vec<Participant>,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// Body for `POST /api/messages`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SendMessageRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub user: String,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub ok: bool,
}

/// Response for `GET /api/poll`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollResponse {
    pub has_unseen: bool,
}

/// Response for `GET /api/sessions/updated`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdatedSessionsResponse {
    pub session_ids: Vec<String>,
}

/// Response for `GET /api/sessions/{id}/history`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Error body returned by the relay API (400/404/500).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}
