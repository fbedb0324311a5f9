//! Protocol messages for the room WebSocket.
//!
//! Envelope is `{"type": ..., "payload": ...}`. Each kind is a variant of a
//! sum type, decoded once via the `type` discriminant.

use serde::{Deserialize, Serialize};

/// Inbound client message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    Leave(MemberRef),
    MuteState(MuteStatePayload),
    Rename(RenamePayload),
    Ping,
}

/// Outbound server event, broadcast to the other members of a room (or, for
/// `Error`/`Pong`, sent to a single connection).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    UserJoined(MemberInfo),
    UserLeft(MemberInfo),
    UserMuteStateChanged(MuteStatePayload),
    UserRenamed(RenamePayload),
    Error { message: String },
    Pong,
}

/// Identifies the acting member; inbound messages must carry the sender's own id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRef {
    pub user_id: String,
}

/// Member identity plus display attributes for join/leave notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MuteStatePayload {
    pub user_id: String,
    pub is_muted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenamePayload {
    pub user_id: String,
    pub user_name: String,
}
