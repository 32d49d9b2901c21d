//! Achievement catalog and unlock records.
//!
//! The catalog is static: four achievements whose ids are derived from
//! progress thresholds. Unlock rows are append-only and unique per
//! (user, achievement); duplicate inserts are ignored at the store layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub const FIRST_LESSON: &str = "first-lesson";
pub const QUIZ_MASTER: &str = "quiz-master";
pub const SAFETY_SCHOLAR: &str = "safety-scholar";
pub const POINT_COLLECTOR: &str = "point-collector";

/// Achievement category shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum AchievementCategory {
    Progress,
    Streak,
    Completion,
    Mastery,
}

/// Catalog entry: static metadata for one achievement.
#[derive(Debug, Clone, Serialize)]
pub struct Achievement {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub category: AchievementCategory,
}

/// The static achievement catalog.
pub const CATALOG: &[Achievement] = &[
    Achievement {
        id: FIRST_LESSON,
        title: "First Steps",
        description: "Completed your first safety lesson",
        icon: "Star",
        category: AchievementCategory::Progress,
    },
    Achievement {
        id: QUIZ_MASTER,
        title: "Quiz Master",
        description: "Completed 5 safety lessons",
        icon: "Brain",
        category: AchievementCategory::Completion,
    },
    Achievement {
        id: SAFETY_SCHOLAR,
        title: "Safety Scholar",
        description: "Completed 25 safety lessons",
        icon: "GraduationCap",
        category: AchievementCategory::Mastery,
    },
    Achievement {
        id: POINT_COLLECTOR,
        title: "Point Collector",
        description: "Earned 1000 points",
        icon: "Trophy",
        category: AchievementCategory::Progress,
    },
];

/// Look up a catalog entry by id.
pub fn catalog_entry(id: &str) -> Option<&'static Achievement> {
    CATALOG.iter().find(|a| a.id == id)
}

/// Achievement ids a user qualifies for at the given progress counts.
///
/// The first-lesson achievement requires an exact count of one so that it
/// is only evaluated at the moment it is earned; the rest are floors and
/// re-qualify on every completion (duplicate unlocks are ignored anyway).
pub fn qualifying_achievements(lessons_completed: u32, total_points: u32) -> Vec<&'static str> {
    let mut ids = Vec::new();

    if lessons_completed == 1 {
        ids.push(FIRST_LESSON);
    }
    if lessons_completed >= 5 {
        ids.push(QUIZ_MASTER);
    }
    if lessons_completed >= 25 {
        ids.push(SAFETY_SCHOLAR);
    }
    if total_points >= 1000 {
        ids.push(POINT_COLLECTOR);
    }

    ids
}

/// Unlock row in the `user_achievements` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementUnlock {
    pub user_id: String,
    pub achievement_id: String,
    pub unlocked_at: DateTime<Utc>,
}

/// An unlock joined with its catalog metadata, as presented to the client.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UnlockedAchievement {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub category: AchievementCategory,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub unlocked_at: DateTime<Utc>,
}

impl UnlockedAchievement {
    /// Join an unlock row with the catalog. Returns `None` when the
    /// catalog no longer carries the id (stale rows are skipped, not fatal).
    pub fn from_unlock(unlock: &AchievementUnlock) -> Option<Self> {
        let entry = catalog_entry(&unlock.achievement_id)?;
        Some(Self {
            id: entry.id.to_string(),
            title: entry.title.to_string(),
            description: entry.description.to_string(),
            icon: entry.icon.to_string(),
            category: entry.category,
            unlocked_at: unlock.unlocked_at,
        })
    }
}
