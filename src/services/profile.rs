// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile/progress synchronization service.
//!
//! Turns a bare identity into the fully assembled user:
//! 1. Fetch the profile, lazily creating it from identity metadata
//! 2. Fetch progress, lazily creating defaults
//! 3. Fetch achievement unlocks and join with the static catalog
//! 4. Combine with the identity email
//!
//! Also applies the progress-affecting mutations (profile edits, lesson
//! completions, achievement unlocks), each atomic per aggregate only.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::auth::Identity;
use crate::db::{AchievementStore, ProfileStore, ProgressStore};
use crate::error::{AppError, Result};
use crate::models::achievement::{qualifying_achievements, AchievementUnlock};
use crate::models::profile::{Profile, ProfileUpdate};
use crate::models::progress::Progress;
use crate::models::user::AuthUser;
use crate::models::UnlockedAchievement;

/// Result of a lesson completion.
#[derive(Debug, Clone, Serialize)]
pub struct LessonOutcome {
    /// False when the lesson was already completed (idempotent no-op)
    pub newly_completed: bool,
    /// Achievement ids recorded for this completion. Re-qualifying ids are
    /// upserted too; the store ignores the duplicates.
    pub unlocked: Vec<String>,
}

/// Assembles users from the three aggregates and applies mutations.
#[derive(Clone)]
pub struct ProfileService {
    profiles: Arc<dyn ProfileStore>,
    progress: Arc<dyn ProgressStore>,
    achievements: Arc<dyn AchievementStore>,
}

impl ProfileService {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        progress: Arc<dyn ProgressStore>,
        achievements: Arc<dyn AchievementStore>,
    ) -> Self {
        Self {
            profiles,
            progress,
            achievements,
        }
    }

    /// Assemble the complete user for an identity.
    ///
    /// Missing profile/progress rows are created with defaults; a failed
    /// creation aborts assembly. Achievement fetch failures degrade to an
    /// empty list unless they look session-related.
    pub async fn assemble(&self, identity: &Identity) -> Result<AuthUser> {
        let user_id = identity.id.as_str();

        let profile = match self.profiles.get_profile(user_id).await? {
            Some(profile) => profile,
            None => {
                tracing::info!(user_id, "Profile missing, creating from identity metadata");
                let seeded = Profile::from_identity(identity);
                self.profiles.create_profile(&seeded).await?;
                // Re-read: a concurrent fetch may have won the insert
                self.profiles.get_profile(user_id).await?.unwrap_or(seeded)
            }
        };

        let progress = match self.progress.get_progress(user_id).await? {
            Some(progress) => progress,
            None => {
                tracing::info!(user_id, "Progress missing, creating defaults");
                let seeded = Progress::new(user_id, Utc::now().date_naive());
                self.progress.create_progress(&seeded).await?;
                self.progress.get_progress(user_id).await?.unwrap_or(seeded)
            }
        };

        let achievements = match self.achievements.list_unlocks(user_id).await {
            Ok(unlocks) => unlocks
                .iter()
                .filter_map(UnlockedAchievement::from_unlock)
                .collect(),
            Err(err) if err.is_session_error() => return Err(err),
            Err(err) => {
                tracing::warn!(user_id, error = %err, "Achievement fetch failed, proceeding without");
                Vec::new()
            }
        };

        Ok(AuthUser::assemble(
            identity.email.clone(),
            profile,
            progress,
            achievements,
        ))
    }

    /// Eagerly create the profile and progress rows at signup.
    ///
    /// Failures are logged, not fatal: lazy creation repairs them on the
    /// next assembled-user fetch.
    pub async fn seed_rows(&self, identity: &Identity) {
        let profile = Profile::from_identity(identity);
        if let Err(err) = self.profiles.create_profile(&profile).await {
            tracing::warn!(user_id = %identity.id, error = %err, "Profile creation at signup failed");
        }

        let progress = Progress::new(&identity.id, Utc::now().date_naive());
        if let Err(err) = self.progress.create_progress(&progress).await {
            tracing::warn!(user_id = %identity.id, error = %err, "Progress creation at signup failed");
        }
    }

    /// Write the provided profile fields; unset fields are left untouched.
    pub async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<()> {
        self.profiles.update_profile(user_id, update).await?;
        tracing::info!(user_id, "Profile updated");
        Ok(())
    }

    /// Record a lesson completion and unlock any newly earned achievements.
    ///
    /// Repeating a completed lesson id is a no-op: no points, no level
    /// change, no write.
    pub async fn complete_lesson(&self, user_id: &str, lesson_id: &str) -> Result<LessonOutcome> {
        let mut progress = self
            .progress
            .get_progress(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("progress for user {}", user_id)))?;

        if !progress.record_completion(lesson_id, Utc::now().date_naive()) {
            tracing::debug!(user_id, lesson_id, "Lesson already completed (idempotent skip)");
            return Ok(LessonOutcome {
                newly_completed: false,
                unlocked: Vec::new(),
            });
        }

        // Persist the whole updated row; on failure the stored state is
        // untouched since only the local copy was mutated.
        self.progress.update_progress(&progress).await?;

        tracing::info!(
            user_id,
            lesson_id,
            total = progress.total_lessons_completed,
            level = progress.current_level,
            "Lesson completed"
        );

        let unlocked = self
            .unlock_qualifying(
                user_id,
                progress.total_lessons_completed,
                progress.total_points,
            )
            .await;

        Ok(LessonOutcome {
            newly_completed: true,
            unlocked,
        })
    }

    /// Upsert every achievement the user currently qualifies for.
    ///
    /// Unlock failures never fail the completion that triggered them.
    async fn unlock_qualifying(
        &self,
        user_id: &str,
        lessons_completed: u32,
        total_points: u32,
    ) -> Vec<String> {
        let mut unlocked = Vec::new();

        for achievement_id in qualifying_achievements(lessons_completed, total_points) {
            let unlock = AchievementUnlock {
                user_id: user_id.to_string(),
                achievement_id: achievement_id.to_string(),
                unlocked_at: Utc::now(),
            };

            match self.achievements.upsert_unlock(&unlock).await {
                Ok(()) => unlocked.push(achievement_id.to_string()),
                Err(err) => {
                    tracing::warn!(
                        user_id,
                        achievement = achievement_id,
                        error = %err,
                        "Achievement unlock failed"
                    );
                }
            }
        }

        unlocked
    }
}
