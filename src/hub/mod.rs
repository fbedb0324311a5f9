//! In-memory registry of live room connections and event fan-out.
//!
//! The hub mirrors session-store membership for connections that are
//! currently open; it is never persisted and is rebuilt from nothing after a
//! restart. The top-level map is guarded by its own lock, and each room slot
//! guards its connection map independently, so broadcasts in unrelated rooms
//! never serialize on each other.

use crate::error::AppResult;
use crate::models::ServerEvent;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

/// Outbound handle plus display snapshot for one live connection.
struct ClientHandle {
    user_name: Option<String>,
    user_image: Option<String>,
    tx: mpsc::UnboundedSender<String>,
}

/// Connections of a single room, keyed by user id.
#[derive(Default)]
struct RoomSlot {
    clients: RwLock<HashMap<String, ClientHandle>>,
}

/// Display attributes of a registered connection, as captured at register
/// time and updated by renames.
#[derive(Debug, Clone)]
pub struct MemberProfile {
    pub user_name: Option<String>,
    pub user_image: Option<String>,
}

/// Registry of live connections grouped by room. Constructor-injected into
/// the handlers; tests instantiate isolated hubs.
#[derive(Default)]
pub struct RoomHub {
    rooms: RwLock<HashMap<String, Arc<RoomSlot>>>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and notify the room's other members.
    ///
    /// The slot lock is held across insert and broadcast so the join
    /// notification and the registry never disagree about membership.
    pub async fn register(
        &self,
        room_id: &str,
        user_id: &str,
        user_name: Option<String>,
        user_image: Option<String>,
        tx: mpsc::UnboundedSender<String>,
    ) -> AppResult<()> {
        // Held across insert + broadcast so a concurrent unregister cannot
        // evict a freshly created slot before the connection lands in it.
        let mut rooms = self.rooms.write().await;
        let slot = rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Arc::new(RoomSlot::default()))
            .clone();

        let event = ServerEvent::UserJoined(crate::models::MemberInfo {
            user_id: user_id.to_string(),
            user_name: user_name.clone(),
            user_image: user_image.clone(),
        });
        let payload = serde_json::to_string(&event)?;

        let mut clients = slot.clients.write().await;
        clients.insert(
            user_id.to_string(),
            ClientHandle { user_name, user_image, tx },
        );
        for (peer_id, client) in clients.iter() {
            if peer_id == user_id {
                continue;
            }
            if client.tx.send(payload.clone()).is_err() {
                warn!(room_id = %room_id, user_id = %peer_id, "dropping join notification, peer channel closed");
            }
        }
        debug!(room_id = %room_id, user_id = %user_id, "connection registered");
        Ok(())
    }

    /// Remove a connection; evicts the room slot when it becomes empty.
    /// Returns false if the connection was not registered (already removed).
    pub async fn unregister(&self, room_id: &str, user_id: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(slot) = rooms.get(room_id).cloned() else {
            return false;
        };
        let mut clients = slot.clients.write().await;
        let removed = clients.remove(user_id).is_some();
        if clients.is_empty() {
            drop(clients);
            rooms.remove(room_id);
            debug!(room_id = %room_id, "room slot evicted");
        }
        removed
    }

    /// Send `event` to every connection in the room except `exclude_user`.
    /// Individual send failures are logged, never propagated.
    pub async fn broadcast(&self, room_id: &str, event: &ServerEvent, exclude_user: &str) -> AppResult<()> {
        let Some(slot) = self.rooms.read().await.get(room_id).cloned() else {
            return Ok(());
        };
        let payload = serde_json::to_string(event)?;

        let clients = slot.clients.read().await;
        for (peer_id, client) in clients.iter() {
            if peer_id == exclude_user {
                continue;
            }
            if client.tx.send(payload.clone()).is_err() {
                warn!(room_id = %room_id, user_id = %peer_id, "send failed, peer channel closed");
            }
        }
        Ok(())
    }

    /// Update the display-name snapshot after a successful rename.
    pub async fn set_display_name(&self, room_id: &str, user_id: &str, user_name: &str) {
        let Some(slot) = self.rooms.read().await.get(room_id).cloned() else {
            return;
        };
        if let Some(client) = slot.clients.write().await.get_mut(user_id) {
            client.user_name = Some(user_name.to_string());
        };
    }

    /// Display snapshot of a registered connection, if any.
    pub async fn profile(&self, room_id: &str, user_id: &str) -> Option<MemberProfile> {
        let slot = self.rooms.read().await.get(room_id).cloned()?;
        let clients = slot.clients.read().await;
        clients.get(user_id).map(|c| MemberProfile {
            user_name: c.user_name.clone(),
            user_image: c.user_image.clone(),
        })
    }

    /// Number of live connections in a room; `None` when no slot exists.
    pub async fn connection_count(&self, room_id: &str) -> Option<usize> {
        let slot = self.rooms.read().await.get(room_id).cloned()?;
        let count = slot.clients.read().await.len();
        Some(count)
    }
}
