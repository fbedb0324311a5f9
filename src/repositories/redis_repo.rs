//! Redis-backed session store for rooms and memberships.
//!
//! Key layout: `rooms:{id}` holds the JSON room record, `rooms:{id}:users`
//! the membership-id set, `users:{roomId}:{userId}` each JSON membership
//! record. Multi-key mutations run as MULTI/EXEC pipelines or Lua scripts so
//! partial state is never observable.

use crate::error::{AppError, AppResult};
use crate::models::{Room, User};
use crate::repositories::RoomRepo;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::sync::Arc;
use tracing::debug;

fn room_key(room_id: &str) -> String {
    format!("rooms:{}", room_id)
}

fn users_key(room_id: &str) -> String {
    format!("rooms:{}:users", room_id)
}

fn user_key(room_id: &str, user_id: &str) -> String {
    format!("users:{}:{}", room_id, user_id)
}

/// Deletes the room record, the membership set, and every membership record
/// listed in the set, in one script.
const DELETE_ROOM_SCRIPT: &str = r#"
local room_key = KEYS[1]
local users_key = KEYS[2]
local room_id = ARGV[1]

local user_ids = redis.call('SMEMBERS', users_key)
local keys_to_delete = {room_key, users_key}
for _, uid in ipairs(user_ids) do
    table.insert(keys_to_delete, 'users:' .. room_id .. ':' .. uid)
end

redis.call('DEL', unpack(keys_to_delete))
return 'OK'
"#;

/// Renews TTL on the room record, the membership set, and every membership
/// record currently in the set, in one script.
const TOUCH_ROOM_SCRIPT: &str = r#"
local room_key = KEYS[1]
local users_key = KEYS[2]
local ttl = tonumber(ARGV[1])
local room_id = ARGV[2]

redis.call('EXPIRE', room_key, ttl)
redis.call('EXPIRE', users_key, ttl)

local user_ids = redis.call('SMEMBERS', users_key)
for _, uid in ipairs(user_ids) do
    redis.call('EXPIRE', 'users:' .. room_id .. ':' .. uid, ttl)
end

return 'OK'
"#;

/// Redis-backed implementation of [`RoomRepo`].
#[derive(Clone)]
pub struct RedisRoomRepo {
    client: Arc<redis::Client>,
    delete_script: Arc<redis::Script>,
    touch_script: Arc<redis::Script>,
}

impl RedisRoomRepo {
    /// Create repository from Redis URL.
    pub fn new(redis_url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client: Arc::new(client),
            delete_script: Arc::new(redis::Script::new(DELETE_ROOM_SCRIPT)),
            touch_script: Arc::new(redis::Script::new(TOUCH_ROOM_SCRIPT)),
        })
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn)
    }

    async fn update_user<F>(&self, room_id: &str, user_id: &str, mutate: F) -> AppResult<()>
    where
        F: FnOnce(&mut User),
    {
        let key = user_key(room_id, user_id);
        let mut conn = self.connection().await?;

        let raw: Option<String> = conn.get(&key).await?;
        let raw = raw.ok_or(AppError::UserNotFound)?;
        let mut user: User = serde_json::from_str(&raw)?;

        mutate(&mut user);
        let data = serde_json::to_string(&user)?;

        // Keep whatever lifetime the record has left instead of resetting it.
        let remaining_ms: i64 = redis::cmd("PTTL")
            .arg(&key)
            .query_async(&mut conn)
            .await?;
        if remaining_ms > 0 {
            redis::cmd("SET")
                .arg(&key)
                .arg(&data)
                .arg("PX")
                .arg(remaining_ms)
                .query_async::<_, ()>(&mut conn)
                .await?;
        } else {
            redis::cmd("SET")
                .arg(&key)
                .arg(&data)
                .query_async::<_, ()>(&mut conn)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl RoomRepo for RedisRoomRepo {
    async fn create_room(&self, room: &Room, ttl_sec: u64) -> AppResult<()> {
        let data = serde_json::to_string(room)?;
        let mut conn = self.connection().await?;
        // SET NX EX: nil reply means the key already existed.
        let reply: Option<String> = redis::cmd("SET")
            .arg(room_key(&room.room_id))
            .arg(&data)
            .arg("NX")
            .arg("EX")
            .arg(ttl_sec)
            .query_async(&mut conn)
            .await?;
        if reply.is_none() {
            return Err(AppError::RoomAlreadyExists);
        }
        debug!(room_id = %room.room_id, "room record created");
        Ok(())
    }

    async fn get_room(&self, room_id: &str) -> AppResult<Option<Room>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(room_key(room_id)).await?;
        match raw {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn exists_room(&self, room_id: &str) -> AppResult<bool> {
        let mut conn = self.connection().await?;
        let exists: bool = conn.exists(room_key(room_id)).await?;
        Ok(exists)
    }

    async fn delete_room(&self, room_id: &str) -> AppResult<()> {
        let mut conn = self.connection().await?;
        self.delete_script
            .key(room_key(room_id))
            .key(users_key(room_id))
            .arg(room_id)
            .invoke_async::<_, ()>(&mut conn)
            .await?;
        debug!(room_id = %room_id, "room and memberships deleted");
        Ok(())
    }

    async fn add_user(&self, room_id: &str, user: &User, ttl_sec: u64) -> AppResult<()> {
        let data = serde_json::to_string(user)?;
        let mut conn = self.connection().await?;
        redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(user_key(room_id, &user.user_id))
            .arg(&data)
            .arg("EX")
            .arg(ttl_sec)
            .cmd("SADD")
            .arg(users_key(room_id))
            .arg(&user.user_id)
            .cmd("EXPIRE")
            .arg(users_key(room_id))
            .arg(ttl_sec)
            .cmd("EXPIRE")
            .arg(room_key(room_id))
            .arg(ttl_sec)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn remove_user(&self, room_id: &str, user_id: &str) -> AppResult<()> {
        let mut conn = self.connection().await?;
        redis::pipe()
            .atomic()
            .cmd("SREM")
            .arg(users_key(room_id))
            .arg(user_id)
            .cmd("DEL")
            .arg(user_key(room_id, user_id))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn list_users(&self, room_id: &str) -> AppResult<Vec<User>> {
        let mut conn = self.connection().await?;
        let ids: Vec<String> = conn.smembers(users_key(room_id)).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| user_key(room_id, id)).collect();
        let raw: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        // Records that expired between the set read and the batched get are
        // skipped; the set entry is stale, not the call.
        let users = raw
            .into_iter()
            .flatten()
            .filter_map(|data| serde_json::from_str(&data).ok())
            .collect();
        Ok(users)
    }

    async fn update_user_mute(&self, room_id: &str, user_id: &str, is_muted: bool) -> AppResult<()> {
        self.update_user(room_id, user_id, |user| user.is_muted = is_muted)
            .await
    }

    async fn update_user_name(&self, room_id: &str, user_id: &str, user_name: &str) -> AppResult<()> {
        self.update_user(room_id, user_id, |user| user.user_name = user_name.to_string())
            .await
    }

    async fn touch_room(&self, room_id: &str, ttl_sec: u64) -> AppResult<()> {
        let mut conn = self.connection().await?;
        self.touch_script
            .key(room_key(room_id))
            .key(users_key(room_id))
            .arg(ttl_sec)
            .arg(room_id)
            .invoke_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}
