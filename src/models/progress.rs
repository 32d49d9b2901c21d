//! Lesson progress aggregate.
//!
//! One row per user, updated whenever a lesson is completed. The level and
//! point totals are derived here so every write path agrees on them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Points awarded per newly completed lesson.
pub const LESSON_POINTS: u32 = 100;

/// Lessons required to advance one level.
const LESSONS_PER_LEVEL: u32 = 3;

/// Level for a given completion count. Level 1 at zero lessons, +1 every
/// three lessons.
pub fn level_for(lessons_completed: u32) -> u32 {
    lessons_completed / LESSONS_PER_LEVEL + 1
}

/// Progress row in the `user_progress` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    /// Identity id from the auth provider (also the row key)
    pub user_id: String,
    pub current_level: u32,
    pub total_lessons_completed: u32,
    pub streak_days: u32,
    pub total_points: u32,
    /// Completed lesson ids. Order is insertion order; membership is what
    /// matters, the length doubles as the completion count.
    #[serde(default)]
    pub completed_lesson_ids: Vec<String>,
    /// Date of the most recent completion (YYYY-MM-DD)
    pub last_activity_date: NaiveDate,
}

impl Progress {
    /// Fresh progress for a user with no history.
    pub fn new(user_id: &str, today: NaiveDate) -> Self {
        Self {
            user_id: user_id.to_string(),
            current_level: 1,
            total_lessons_completed: 0,
            streak_days: 1,
            total_points: 0,
            completed_lesson_ids: Vec::new(),
            last_activity_date: today,
        }
    }

    /// Record a lesson completion.
    ///
    /// Returns `true` if the lesson was newly completed.
    /// Returns `false` if the lesson was already completed (no state change).
    pub fn record_completion(&mut self, lesson_id: &str, today: NaiveDate) -> bool {
        // Idempotency check: a repeated completion is a no-op
        if self.completed_lesson_ids.iter().any(|id| id == lesson_id) {
            return false;
        }

        self.completed_lesson_ids.push(lesson_id.to_string());
        self.total_lessons_completed = self.completed_lesson_ids.len() as u32;
        self.current_level = level_for(self.total_lessons_completed);
        self.total_points += LESSON_POINTS;
        self.last_activity_date = today;

        true
    }
}
