//! In-memory store backend for tests and offline development.
//!
//! Implements the same conflict-ignore semantics as the REST backend so
//! the services behave identically against either.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::db::{AchievementStore, ProfileStore, ProgressStore};
use crate::error::AppError;
use crate::models::achievement::AchievementUnlock;
use crate::models::profile::{Profile, ProfileUpdate};
use crate::models::progress::Progress;

/// In-memory row store.
#[derive(Clone, Default)]
pub struct MemoryDb {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    profiles: RwLock<HashMap<String, Profile>>,
    progress: RwLock<HashMap<String, Progress>>,
    /// Keyed by (user id, achievement id) to enforce uniqueness.
    unlocks: RwLock<HashMap<(String, String), AchievementUnlock>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryDb {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        Ok(self.inner.profiles.read().await.get(user_id).cloned())
    }

    async fn create_profile(&self, profile: &Profile) -> Result<(), AppError> {
        let mut profiles = self.inner.profiles.write().await;
        profiles
            .entry(profile.id.clone())
            .or_insert_with(|| {
                let mut row = profile.clone();
                if row.created_at.is_empty() {
                    row.created_at = chrono::Utc::now().to_rfc3339();
                }
                row
            });
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<(), AppError> {
        let mut profiles = self.inner.profiles.write().await;
        // A missing row is a no-op, matching PATCH-with-filter semantics
        if let Some(profile) = profiles.get_mut(user_id) {
            if let Some(name) = &update.name {
                profile.name = name.clone();
            }
            if let Some(age) = update.age {
                profile.age = age;
            }
            if let Some(age_group) = update.age_group {
                profile.age_group = age_group;
            }
            if let Some(avatar) = &update.avatar {
                profile.avatar = avatar.clone();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for MemoryDb {
    async fn get_progress(&self, user_id: &str) -> Result<Option<Progress>, AppError> {
        Ok(self.inner.progress.read().await.get(user_id).cloned())
    }

    async fn create_progress(&self, progress: &Progress) -> Result<(), AppError> {
        let mut rows = self.inner.progress.write().await;
        rows.entry(progress.user_id.clone())
            .or_insert_with(|| progress.clone());
        Ok(())
    }

    async fn update_progress(&self, progress: &Progress) -> Result<(), AppError> {
        let mut rows = self.inner.progress.write().await;
        if let Some(row) = rows.get_mut(&progress.user_id) {
            *row = progress.clone();
        }
        Ok(())
    }
}

#[async_trait]
impl AchievementStore for MemoryDb {
    async fn list_unlocks(&self, user_id: &str) -> Result<Vec<AchievementUnlock>, AppError> {
        let unlocks = self.inner.unlocks.read().await;
        Ok(unlocks
            .values()
            .filter(|u| u.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn upsert_unlock(&self, unlock: &AchievementUnlock) -> Result<(), AppError> {
        let mut unlocks = self.inner.unlocks.write().await;
        unlocks
            .entry((unlock.user_id.clone(), unlock.achievement_id.clone()))
            .or_insert_with(|| unlock.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn profile(id: &str, name: &str) -> Profile {
        Profile {
            id: id.to_string(),
            name: name.to_string(),
            age: 12,
            age_group: crate::models::profile::AgeGroup::Tween,
            avatar: String::new(),
            created_at: String::new(),
        }
    }

    #[tokio::test]
    async fn test_create_profile_ignores_conflict() {
        let db = MemoryDb::new();
        db.create_profile(&profile("u1", "First")).await.unwrap();
        db.create_profile(&profile("u1", "Second")).await.unwrap();

        let stored = db.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(stored.name, "First");
        assert!(!stored.created_at.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_unlock_ignored() {
        let db = MemoryDb::new();
        let unlock = AchievementUnlock {
            user_id: "u1".to_string(),
            achievement_id: "first-lesson".to_string(),
            unlocked_at: Utc::now(),
        };

        db.upsert_unlock(&unlock).await.unwrap();
        db.upsert_unlock(&unlock).await.unwrap();

        assert_eq!(db.list_unlocks("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_partial_profile_update() {
        let db = MemoryDb::new();
        db.create_profile(&profile("u1", "Maya")).await.unwrap();

        db.update_profile(
            "u1",
            &ProfileUpdate {
                avatar: Some("owl".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let stored = db.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(stored.name, "Maya");
        assert_eq!(stored.avatar, "owl");
    }
}
