//! Room lifecycle: create, get, delete, join, leave, touch, mute, rename.

use crate::error::{AppError, AppResult};
use crate::idgen::IdGenerator;
use crate::models::{Room, User};
use crate::repositories::RoomRepo;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Attempts before `Create` gives up on finding an unused room id.
const MAX_ID_ATTEMPTS: usize = 10;

/// Orchestrates the session store into room use-cases, enforcing ownership
/// and existence invariants the store does not know about.
#[derive(Clone)]
pub struct RoomService {
    repo: Arc<dyn RoomRepo>,
    idgen: Arc<dyn IdGenerator>,
    ttl_sec: u64,
}

impl RoomService {
    pub fn new(repo: Arc<dyn RoomRepo>, idgen: Arc<dyn IdGenerator>, ttl_sec: u64) -> Self {
        Self { repo, idgen, ttl_sec }
    }

    /// Insert a room record under a freshly generated id, retrying up to
    /// `max_attempts` times when the id is taken. A store-level
    /// `RoomAlreadyExists` counts as a collision too: it means another
    /// creator won the race after our existence check.
    async fn create_with_unused_id(&self, owner_id: &str, max_attempts: usize) -> AppResult<Room> {
        for _ in 0..max_attempts {
            let room_id = self.idgen.generate()?;
            if self.repo.exists_room(&room_id).await? {
                continue;
            }
            let room = Room {
                room_id,
                owner_id: owner_id.to_string(),
                created_at: chrono::Utc::now().timestamp(),
            };
            match self.repo.create_room(&room, self.ttl_sec).await {
                Ok(()) => return Ok(room),
                Err(AppError::RoomAlreadyExists) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(AppError::IdGenerationExhausted)
    }

    /// Create a room owned by `owner` and add the owner as its first member.
    ///
    /// Two-step saga: if adding the owner fails, the just-created room is
    /// deleted as best-effort compensation. A crash between the steps leaves
    /// an orphaned room that the TTL reclaims.
    #[instrument(skip(self, owner), fields(owner_id = %owner.user_id))]
    pub async fn create(&self, owner: User) -> AppResult<String> {
        let room = self
            .create_with_unused_id(&owner.user_id, MAX_ID_ATTEMPTS)
            .await?;
        let room_id = room.room_id;

        if let Err(e) = self.repo.add_user(&room_id, &owner, self.ttl_sec).await {
            warn!(room_id = %room_id, error = %e, "owner add failed, rolling back room");
            let _ = self.repo.delete_room(&room_id).await;
            return Err(e);
        }

        info!(room_id = %room_id, "room created");
        Ok(room_id)
    }

    /// Room record plus current membership. `None` when the room does not exist.
    pub async fn get(&self, room_id: &str) -> AppResult<Option<(Room, Vec<User>)>> {
        let Some(room) = self.repo.get_room(room_id).await? else {
            return Ok(None);
        };
        let users = self.repo.list_users(room_id).await?;
        Ok(Some((room, users)))
    }

    /// Delete a room. Owner only.
    #[instrument(skip(self))]
    pub async fn delete(&self, room_id: &str, user_id: &str) -> AppResult<()> {
        let room = self
            .repo
            .get_room(room_id)
            .await?
            .ok_or(AppError::RoomNotFound)?;
        if room.owner_id != user_id {
            return Err(AppError::NotRoomOwner);
        }
        self.repo.delete_room(room_id).await?;
        info!(room_id = %room_id, "room deleted");
        Ok(())
    }

    /// Add `user` to an existing room. Rejoining overwrites any stale record
    /// for the same user id.
    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn join(&self, room_id: &str, user: User) -> AppResult<()> {
        if !self.repo.exists_room(room_id).await? {
            return Err(AppError::RoomNotFound);
        }
        self.repo.add_user(room_id, &user, self.ttl_sec).await
    }

    /// Remove a user from a room. Removing a non-member is a no-op.
    pub async fn leave(&self, room_id: &str, user_id: &str) -> AppResult<()> {
        self.repo.remove_user(room_id, user_id).await
    }

    /// Renew the TTL on the room and all of its membership records.
    pub async fn touch(&self, room_id: &str) -> AppResult<()> {
        self.repo.touch_room(room_id, self.ttl_sec).await
    }

    pub async fn set_mute_state(&self, room_id: &str, user_id: &str, is_muted: bool) -> AppResult<()> {
        self.repo.update_user_mute(room_id, user_id, is_muted).await
    }

    pub async fn set_user_name(&self, room_id: &str, user_id: &str, user_name: &str) -> AppResult<()> {
        self.repo.update_user_name(room_id, user_id, user_name).await
    }
}
