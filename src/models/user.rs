//! The assembled user: profile, progress, and achievements joined with the
//! identity email. Recomputed on every fetch, never persisted as a row.

use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::achievement::UnlockedAchievement;
use crate::models::profile::{AgeGroup, Profile};
use crate::models::progress::Progress;

/// Progress counters as presented to the client.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProgressSummary {
    pub current_level: u32,
    pub total_lessons_completed: u32,
    pub streak_days: u32,
    pub total_points: u32,
    pub completed_lesson_ids: Vec<String>,
}

impl From<Progress> for ProgressSummary {
    fn from(progress: Progress) -> Self {
        Self {
            current_level: progress.current_level,
            total_lessons_completed: progress.total_lessons_completed,
            streak_days: progress.streak_days,
            total_points: progress.total_points,
            completed_lesson_ids: progress.completed_lesson_ids,
        }
    }
}

/// The fully assembled current user.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub age: u8,
    pub age_group: AgeGroup,
    pub avatar: String,
    pub progress: ProgressSummary,
    pub achievements: Vec<UnlockedAchievement>,
    pub created_at: String,
}

impl AuthUser {
    /// Combine the three aggregates with the identity email.
    pub fn assemble(
        email: Option<String>,
        profile: Profile,
        progress: Progress,
        achievements: Vec<UnlockedAchievement>,
    ) -> Self {
        Self {
            id: profile.id,
            email: email.unwrap_or_default(),
            name: profile.name,
            age: profile.age,
            age_group: profile.age_group,
            avatar: profile.avatar,
            progress: progress.into(),
            achievements,
            created_at: profile.created_at,
        }
    }
}
