//! WebSocket handler: one connection per (room, user), inbound protocol
//! dispatch, and fan-out of state changes via the hub.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::AppError;
use crate::handlers::http::{require_id, AppState};
use crate::models::{ClientMessage, MemberInfo, RenamePayload, ServerEvent};

/// Whether the receive loop keeps running after a message.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LoopAction {
    Continue,
    Close,
}

/// Upgrade HTTP to WebSocket for `GET /api/v1/room/:room_id/ws?userId=...`.
///
/// A room that does not exist in the store is not rejected here; the
/// connection simply starts with an empty membership snapshot.
pub async fn ws_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let room_id = require_id(&room_id, "roomId")?.to_string();
    let user_id = require_id(params.get("userId").map(String::as_str).unwrap_or(""), "userId")?.to_string();

    // Seed the display snapshot from current membership so join/leave
    // notifications can carry name and image.
    let (user_name, user_image) = match state.room_service.get(&room_id).await {
        Ok(Some((_, users))) => users
            .into_iter()
            .find(|u| u.user_id == user_id)
            .map(|u| {
                let name = if u.user_name.is_empty() { None } else { Some(u.user_name) };
                (name, u.user_image)
            })
            .unwrap_or((None, None)),
        _ => (None, None),
    };

    Ok(ws.on_upgrade(move |socket| {
        handle_socket(state, socket, room_id, user_id, user_name, user_image)
    }))
}

async fn handle_socket(
    state: AppState,
    socket: WebSocket,
    room_id: String,
    user_id: String,
    user_name: Option<String>,
    user_image: Option<String>,
) {
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    if let Err(e) = state
        .hub
        .register(&room_id, &user_id, user_name, user_image, tx.clone())
        .await
    {
        warn!(room_id = %room_id, user_id = %user_id, error = %e, "registration failed");
        send_task.abort();
        return;
    }
    info!(room_id = %room_id, user_id = %user_id, "ws connected");

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(room_id = %room_id, user_id = %user_id, error = %e, "ignoring unrecognized message");
                        continue;
                    }
                };
                if dispatch(&state, &room_id, &user_id, &tx, client_msg).await == LoopAction::Close {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Single exit path for explicit leave, read error, and close alike, so
    // the store leave and the user_left broadcast happen exactly once.
    cleanup(&state, &room_id, &user_id).await;
    send_task.abort();
    info!(room_id = %room_id, user_id = %user_id, "ws disconnected");
}

/// Handle one decoded protocol message. Mutating messages must carry the
/// connection's own user id; a mismatch drops the message without a reply.
pub(crate) async fn dispatch(
    state: &AppState,
    room_id: &str,
    user_id: &str,
    tx: &mpsc::UnboundedSender<String>,
    msg: ClientMessage,
) -> LoopAction {
    match msg {
        ClientMessage::Leave(payload) => {
            if payload.user_id != user_id {
                warn!(room_id = %room_id, expected = %user_id, got = %payload.user_id, "leave for another user dropped");
                return LoopAction::Continue;
            }
            // The post-loop cleanup performs the actual leave.
            LoopAction::Close
        }
        ClientMessage::MuteState(payload) => {
            if payload.user_id != user_id {
                warn!(room_id = %room_id, expected = %user_id, got = %payload.user_id, "mute_state for another user dropped");
                return LoopAction::Continue;
            }
            match state
                .room_service
                .set_mute_state(room_id, &payload.user_id, payload.is_muted)
                .await
            {
                Ok(()) => {
                    let event = ServerEvent::UserMuteStateChanged(payload);
                    if let Err(e) = state.hub.broadcast(room_id, &event, user_id).await {
                        warn!(room_id = %room_id, error = %e, "mute broadcast failed");
                    }
                }
                Err(e) => {
                    warn!(room_id = %room_id, user_id = %user_id, error = %e, "mute update failed");
                    send_error(tx, "Failed to update mute state");
                }
            }
            LoopAction::Continue
        }
        ClientMessage::Rename(payload) => {
            if payload.user_id != user_id {
                warn!(room_id = %room_id, expected = %user_id, got = %payload.user_id, "rename for another user dropped");
                return LoopAction::Continue;
            }
            let new_name = payload.user_name.trim();
            if new_name.is_empty() {
                warn!(room_id = %room_id, user_id = %user_id, "rename with blank userName dropped");
                return LoopAction::Continue;
            }
            match state
                .room_service
                .set_user_name(room_id, &payload.user_id, new_name)
                .await
            {
                Ok(()) => {
                    state.hub.set_display_name(room_id, user_id, new_name).await;
                    let event = ServerEvent::UserRenamed(RenamePayload {
                        user_id: payload.user_id,
                        user_name: new_name.to_string(),
                    });
                    if let Err(e) = state.hub.broadcast(room_id, &event, user_id).await {
                        warn!(room_id = %room_id, error = %e, "rename broadcast failed");
                    }
                }
                Err(e) => {
                    warn!(room_id = %room_id, user_id = %user_id, error = %e, "rename failed");
                    send_error(tx, "Failed to rename user");
                }
            }
            LoopAction::Continue
        }
        ClientMessage::Ping => {
            if let Ok(pong) = serde_json::to_string(&ServerEvent::Pong) {
                let _ = tx.send(pong);
            }
            LoopAction::Continue
        }
    }
}

/// Leave the room in the store, notify peers, and drop the registry entry.
async fn cleanup(state: &AppState, room_id: &str, user_id: &str) {
    let profile = state.hub.profile(room_id, user_id).await;

    match state.room_service.leave(room_id, user_id).await {
        Ok(()) => {
            let event = ServerEvent::UserLeft(MemberInfo {
                user_id: user_id.to_string(),
                user_name: profile.as_ref().and_then(|p| p.user_name.clone()),
                user_image: profile.as_ref().and_then(|p| p.user_image.clone()),
            });
            if let Err(e) = state.hub.broadcast(room_id, &event, user_id).await {
                warn!(room_id = %room_id, error = %e, "leave broadcast failed");
            }
        }
        Err(e) => {
            warn!(room_id = %room_id, user_id = %user_id, error = %e, "auto-leave failed");
        }
    }

    state.hub.unregister(room_id, user_id).await;
}

/// Send an `error` event to the originating connection only.
fn send_error(tx: &mpsc::UnboundedSender<String>, message: &str) {
    if let Ok(payload) = serde_json::to_string(&ServerEvent::Error {
        message: message.to_string(),
    }) {
        let _ = tx.send(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::RoomHub;
    use crate::idgen::RoomIdGenerator;
    use crate::models::{MemberRef, MuteStatePayload, User};
    use crate::repositories::memory::MemoryRoomRepo;
    use crate::services::RoomService;
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedReceiver;

    async fn state_with_room() -> (AppState, String) {
        let repo = Arc::new(MemoryRoomRepo::new());
        let service = RoomService::new(repo, Arc::new(RoomIdGenerator), 3600);
        let room_id = service
            .create(User::new("u1", "alice", None))
            .await
            .unwrap();
        service
            .join(&room_id, User::new("u2", "bob", None))
            .await
            .unwrap();
        let state = AppState {
            room_service: service,
            hub: Arc::new(RoomHub::new()),
        };
        (state, room_id)
    }

    async fn connect(state: &AppState, room_id: &str, user_id: &str) -> UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        state
            .hub
            .register(room_id, user_id, Some(user_id.to_string()), None, tx)
            .await
            .unwrap();
        rx
    }

    fn own_tx() -> (mpsc::UnboundedSender<String>, UnboundedReceiver<String>) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn mute_state_updates_store_and_notifies_peer_only() {
        let (state, room_id) = state_with_room().await;
        let (tx1, mut rx1) = own_tx();
        state.hub.register(&room_id, "u1", None, None, tx1.clone()).await.unwrap();
        let mut rx2 = connect(&state, &room_id, "u2").await;
        rx1.try_recv().unwrap(); // drain u2's join

        let action = dispatch(
            &state,
            &room_id,
            "u1",
            &tx1,
            ClientMessage::MuteState(MuteStatePayload { user_id: "u1".into(), is_muted: true }),
        )
        .await;
        assert_eq!(action, LoopAction::Continue);

        let (_, users) = state.room_service.get(&room_id).await.unwrap().unwrap();
        assert!(users.iter().find(|u| u.user_id == "u1").unwrap().is_muted);

        let msg: serde_json::Value = serde_json::from_str(&rx2.try_recv().unwrap()).unwrap();
        assert_eq!(msg["type"], "user_mute_state_changed");
        assert_eq!(msg["payload"]["userId"], "u1");
        assert!(rx1.try_recv().is_err(), "originator must not receive its own event");
    }

    #[tokio::test]
    async fn mismatched_user_id_produces_no_change_and_no_broadcast() {
        let (state, room_id) = state_with_room().await;
        let (tx1, mut rx1) = own_tx();
        state.hub.register(&room_id, "u1", None, None, tx1.clone()).await.unwrap();
        let mut rx2 = connect(&state, &room_id, "u2").await;
        rx1.try_recv().unwrap();

        let action = dispatch(
            &state,
            &room_id,
            "u1",
            &tx1,
            ClientMessage::MuteState(MuteStatePayload { user_id: "u2".into(), is_muted: true }),
        )
        .await;
        assert_eq!(action, LoopAction::Continue);

        let (_, users) = state.room_service.get(&room_id).await.unwrap().unwrap();
        assert!(users.iter().all(|u| !u.is_muted));
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_delegation_sends_error_to_originator_only() {
        let (state, room_id) = state_with_room().await;
        let (tx_ghost, mut rx_ghost) = own_tx();
        state.hub.register(&room_id, "ghost", None, None, tx_ghost.clone()).await.unwrap();
        let mut rx2 = connect(&state, &room_id, "u2").await;
        rx_ghost.try_recv().unwrap();

        // "ghost" holds a connection but no membership record.
        dispatch(
            &state,
            &room_id,
            "ghost",
            &tx_ghost,
            ClientMessage::MuteState(MuteStatePayload { user_id: "ghost".into(), is_muted: true }),
        )
        .await;

        let msg: serde_json::Value = serde_json::from_str(&rx_ghost.try_recv().unwrap()).unwrap();
        assert_eq!(msg["type"], "error");
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn rename_with_blank_name_is_dropped() {
        let (state, room_id) = state_with_room().await;
        let (tx1, _rx1) = own_tx();
        state.hub.register(&room_id, "u1", None, None, tx1.clone()).await.unwrap();

        dispatch(
            &state,
            &room_id,
            "u1",
            &tx1,
            ClientMessage::Rename(RenamePayload { user_id: "u1".into(), user_name: "   ".into() }),
        )
        .await;

        let (_, users) = state.room_service.get(&room_id).await.unwrap().unwrap();
        assert_eq!(users.iter().find(|u| u.user_id == "u1").unwrap().user_name, "alice");
    }

    #[tokio::test]
    async fn rename_trims_updates_snapshot_and_broadcasts() {
        let (state, room_id) = state_with_room().await;
        let (tx1, mut rx1) = own_tx();
        state.hub.register(&room_id, "u1", None, None, tx1.clone()).await.unwrap();
        let mut rx2 = connect(&state, &room_id, "u2").await;
        rx1.try_recv().unwrap();

        dispatch(
            &state,
            &room_id,
            "u1",
            &tx1,
            ClientMessage::Rename(RenamePayload { user_id: "u1".into(), user_name: " carol ".into() }),
        )
        .await;

        let (_, users) = state.room_service.get(&room_id).await.unwrap().unwrap();
        assert_eq!(users.iter().find(|u| u.user_id == "u1").unwrap().user_name, "carol");

        let profile = state.hub.profile(&room_id, "u1").await.unwrap();
        assert_eq!(profile.user_name.as_deref(), Some("carol"));

        let msg: serde_json::Value = serde_json::from_str(&rx2.try_recv().unwrap()).unwrap();
        assert_eq!(msg["type"], "user_renamed");
        assert_eq!(msg["payload"]["userName"], "carol");
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let (state, room_id) = state_with_room().await;
        let (tx1, mut rx1) = own_tx();

        dispatch(&state, &room_id, "u1", &tx1, ClientMessage::Ping).await;
        let msg: serde_json::Value = serde_json::from_str(&rx1.try_recv().unwrap()).unwrap();
        assert_eq!(msg["type"], "pong");
    }

    #[tokio::test]
    async fn explicit_leave_closes_loop_only_for_own_id() {
        let (state, room_id) = state_with_room().await;
        let (tx1, _rx1) = own_tx();

        let action = dispatch(
            &state,
            &room_id,
            "u1",
            &tx1,
            ClientMessage::Leave(MemberRef { user_id: "u2".into() }),
        )
        .await;
        assert_eq!(action, LoopAction::Continue);

        let action = dispatch(
            &state,
            &room_id,
            "u1",
            &tx1,
            ClientMessage::Leave(MemberRef { user_id: "u1".into() }),
        )
        .await;
        assert_eq!(action, LoopAction::Close);
    }

    #[tokio::test]
    async fn cleanup_leaves_store_broadcasts_once_and_evicts_empty_slot() {
        let (state, room_id) = state_with_room().await;
        let (tx1, _rx1) = own_tx();
        state
            .hub
            .register(&room_id, "u1", Some("alice".into()), None, tx1.clone())
            .await
            .unwrap();
        let mut rx2 = connect(&state, &room_id, "u2").await;

        cleanup(&state, &room_id, "u1").await;

        let (_, users) = state.room_service.get(&room_id).await.unwrap().unwrap();
        assert!(!users.iter().any(|u| u.user_id == "u1"));

        let msg: serde_json::Value = serde_json::from_str(&rx2.try_recv().unwrap()).unwrap();
        assert_eq!(msg["type"], "user_left");
        assert_eq!(msg["payload"]["userId"], "u1");
        assert_eq!(msg["payload"]["userName"], "alice");
        assert!(rx2.try_recv().is_err(), "exactly one user_left");

        cleanup(&state, &room_id, "u2").await;
        assert_eq!(state.hub.connection_count(&room_id).await, None);
    }
}
