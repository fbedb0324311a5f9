//! HTTP handlers: room lifecycle endpoints and health.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::hub::RoomHub;
use crate::models::User;
use crate::services::RoomService;

/// Shared application state for HTTP and WebSocket handlers.
#[derive(Clone)]
pub struct AppState {
    pub room_service: RoomService,
    pub hub: Arc<RoomHub>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub user_image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub user_image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub user_id: String,
}

/// Trim surrounding whitespace from an identifier.
pub(crate) fn normalize_id(id: &str) -> &str {
    id.trim()
}

pub(crate) fn require_id<'a>(id: &'a str, field: &str) -> AppResult<&'a str> {
    let id = normalize_id(id);
    if id.is_empty() {
        return Err(AppError::Validation(format!("{field} required")));
    }
    Ok(id)
}

/// POST /api/v1/room/create
pub async fn create_room(
    State(state): State<AppState>,
    Json(body): Json<CreateRoomRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let user_id = require_id(&body.user_id, "userId")?;
    let owner = User::new(user_id, body.user_name.clone(), body.user_image.clone());
    let room_id = state.room_service.create(owner).await?;
    Ok(Json(json!({ "success": true, "roomId": room_id })))
}

/// GET /api/v1/room/:room_id
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let room_id = require_id(&room_id, "roomId")?;
    let (room, users) = state
        .room_service
        .get(room_id)
        .await?
        .ok_or(AppError::RoomNotFound)?;
    Ok(Json(json!({ "room": room, "users": users })))
}

/// DELETE /api/v1/room/delete/:room_id — owner only.
pub async fn delete_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(body): Json<UserRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let room_id = require_id(&room_id, "roomId")?;
    let user_id = require_id(&body.user_id, "userId")?;
    state.room_service.delete(room_id, user_id).await?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/v1/room/:room_id/join
pub async fn join_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(body): Json<JoinRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let room_id = require_id(&room_id, "roomId")?;
    let user_id = require_id(&body.user_id, "userId")?;
    let user = User::new(user_id, body.user_name.clone(), body.user_image.clone());
    state.room_service.join(room_id, user).await?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/v1/room/:room_id/leave
pub async fn leave_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(body): Json<UserRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let room_id = require_id(&room_id, "roomId")?;
    let user_id = require_id(&body.user_id, "userId")?;
    state.room_service.leave(room_id, user_id).await?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/v1/room/:room_id/touch — renew the room's TTL.
pub async fn touch_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let room_id = require_id(&room_id, "roomId")?;
    state.room_service.touch(room_id).await?;
    Ok(Json(json!({ "success": true })))
}

/// GET /api/v1/healthz — liveness probe.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": "roomcast" })),
    )
}
