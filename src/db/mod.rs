//! Store layer: row-store ports and their backends.

pub mod memory;
pub mod postgrest;

pub use memory::MemoryDb;
pub use postgrest::PostgrestDb;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::achievement::AchievementUnlock;
use crate::models::profile::{Profile, ProfileUpdate};
use crate::models::progress::Progress;

/// Table names as constants.
pub mod tables {
    pub const USERS: &str = "users";
    pub const USER_PROGRESS: &str = "user_progress";
    pub const USER_ACHIEVEMENTS: &str = "user_achievements";
}

/// Profile rows, keyed by identity id.
///
/// "Not found" is `Ok(None)`, never an error.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError>;

    /// Insert the row if absent. A concurrent or pre-existing row wins and
    /// the conflict is ignored, so lazy creation is idempotent at the store.
    async fn create_profile(&self, profile: &Profile) -> Result<(), AppError>;

    /// Write only the fields set in `update`; a missing row is a no-op.
    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate)
        -> Result<(), AppError>;
}

/// Progress rows, keyed by identity id.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn get_progress(&self, user_id: &str) -> Result<Option<Progress>, AppError>;

    /// Insert the row if absent, ignoring conflicts (see `create_profile`).
    async fn create_progress(&self, progress: &Progress) -> Result<(), AppError>;

    async fn update_progress(&self, progress: &Progress) -> Result<(), AppError>;
}

/// Achievement unlock rows, unique on (user id, achievement id).
#[async_trait]
pub trait AchievementStore: Send + Sync {
    async fn list_unlocks(&self, user_id: &str) -> Result<Vec<AchievementUnlock>, AppError>;

    /// Insert the unlock, ignoring a duplicate (user id, achievement id).
    async fn upsert_unlock(&self, unlock: &AchievementUnlock) -> Result<(), AppError>;
}
