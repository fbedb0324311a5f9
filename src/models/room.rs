//! Room and membership records as stored and served over the wire.

use serde::{Deserialize, Serialize};

/// A voice-chat room. `owner_id` is fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_id: String,
    pub owner_id: String,
    /// Unix timestamp (seconds).
    pub created_at: i64,
}

/// Per-(room, user) membership record. The same person holds independent
/// records in different rooms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_image: Option<String>,
    #[serde(default)]
    pub is_muted: bool,
}

impl User {
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>, user_image: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            user_image,
            is_muted: false,
        }
    }
}
