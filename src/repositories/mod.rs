//! Session store: TTL-scoped room and membership records.

pub mod redis_repo;

#[cfg(test)]
pub mod memory;

pub use redis_repo::RedisRoomRepo;

use crate::error::AppResult;
use crate::models::{Room, User};
use async_trait::async_trait;

/// Durable room/membership store. All records for one room expire together;
/// multi-key mutations are atomic (see `RedisRoomRepo`).
#[async_trait]
pub trait RoomRepo: Send + Sync {
    /// Insert only if absent; `AppError::RoomAlreadyExists` on collision.
    async fn create_room(&self, room: &Room, ttl_sec: u64) -> AppResult<()>;
    async fn get_room(&self, room_id: &str) -> AppResult<Option<Room>>;
    async fn exists_room(&self, room_id: &str) -> AppResult<bool>;
    /// Removes the room record, the membership set, and every membership
    /// record in one indivisible operation.
    async fn delete_room(&self, room_id: &str) -> AppResult<()>;

    /// Writes the membership record, adds the id to the room's membership
    /// set, and renews TTL on the set and the room record, atomically.
    async fn add_user(&self, room_id: &str, user: &User, ttl_sec: u64) -> AppResult<()>;
    async fn remove_user(&self, room_id: &str, user_id: &str) -> AppResult<()>;
    /// Ids in the set whose record has expired are skipped, not errors.
    async fn list_users(&self, room_id: &str) -> AppResult<Vec<User>>;
    /// Read-modify-write preserving the record's remaining TTL;
    /// `AppError::UserNotFound` when no record exists.
    async fn update_user_mute(&self, room_id: &str, user_id: &str, is_muted: bool) -> AppResult<()>;
    async fn update_user_name(&self, room_id: &str, user_id: &str, user_name: &str) -> AppResult<()>;

    /// Renews TTL on the room record, the membership set, and every current
    /// membership record, atomically.
    async fn touch_room(&self, room_id: &str, ttl_sec: u64) -> AppResult<()>;
}
