//! In-memory [`RoomRepo`] used by service and hub tests in place of Redis.

use crate::error::{AppError, AppResult};
use crate::models::{Room, User};
use crate::repositories::RoomRepo;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    rooms: HashMap<String, Room>,
    // room_id -> (user_id -> record)
    members: HashMap<String, HashMap<String, User>>,
}

/// TTL-free stand-in for the Redis store. `fail_add_user` forces the next
/// `add_user` to fail, for exercising the create-room compensation path.
#[derive(Default)]
pub struct MemoryRoomRepo {
    inner: Mutex<Inner>,
    pub fail_add_user: AtomicBool,
}

impl MemoryRoomRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomRepo for MemoryRoomRepo {
    async fn create_room(&self, room: &Room, _ttl_sec: u64) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.rooms.contains_key(&room.room_id) {
            return Err(AppError::RoomAlreadyExists);
        }
        inner.rooms.insert(room.room_id.clone(), room.clone());
        Ok(())
    }

    async fn get_room(&self, room_id: &str) -> AppResult<Option<Room>> {
        Ok(self.inner.lock().await.rooms.get(room_id).cloned())
    }

    async fn exists_room(&self, room_id: &str) -> AppResult<bool> {
        Ok(self.inner.lock().await.rooms.contains_key(room_id))
    }

    async fn delete_room(&self, room_id: &str) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        inner.rooms.remove(room_id);
        inner.members.remove(room_id);
        Ok(())
    }

    async fn add_user(&self, room_id: &str, user: &User, _ttl_sec: u64) -> AppResult<()> {
        if self.fail_add_user.swap(false, Ordering::SeqCst) {
            return Err(AppError::Internal(anyhow::anyhow!("injected add_user failure")));
        }
        let mut inner = self.inner.lock().await;
        inner
            .members
            .entry(room_id.to_string())
            .or_default()
            .insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn remove_user(&self, room_id: &str, user_id: &str) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(members) = inner.members.get_mut(room_id) {
            members.remove(user_id);
        }
        Ok(())
    }

    async fn list_users(&self, room_id: &str) -> AppResult<Vec<User>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .members
            .get(room_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn update_user_mute(&self, room_id: &str, user_id: &str, is_muted: bool) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let user = inner
            .members
            .get_mut(room_id)
            .and_then(|m| m.get_mut(user_id))
            .ok_or(AppError::UserNotFound)?;
        user.is_muted = is_muted;
        Ok(())
    }

    async fn update_user_name(&self, room_id: &str, user_id: &str, user_name: &str) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let user = inner
            .members
            .get_mut(room_id)
            .and_then(|m| m.get_mut(user_id))
            .ok_or(AppError::UserNotFound)?;
        user.user_name = user_name.to_string();
        Ok(())
    }

    async fn touch_room(&self, _room_id: &str, _ttl_sec: u64) -> AppResult<()> {
        Ok(())
    }
}
