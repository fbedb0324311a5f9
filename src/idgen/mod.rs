//! Room identifier generation.

use crate::error::{AppError, AppResult};
use rand::rngs::OsRng;
use rand::RngCore;

const ROOM_ID_LEN: usize = 7;
const ROOM_ID_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Produces short, unpredictable identifiers. Uniqueness is not guaranteed
/// here; callers enforce it with an existence check and retry.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> AppResult<String>;
}

/// Default generator: fixed-length alphanumeric ids from the OS entropy source.
#[derive(Debug, Clone, Default)]
pub struct RoomIdGenerator;

impl IdGenerator for RoomIdGenerator {
    fn generate(&self) -> AppResult<String> {
        let mut buf = [0u8; ROOM_ID_LEN];
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("entropy source: {e}")))?;
        let id = buf
            .iter()
            .map(|b| ROOM_ID_CHARS[*b as usize % ROOM_ID_CHARS.len()] as char)
            .collect();
        Ok(id)
    }
}
