//! Progress tracker
//!
//! Records per-lesson completion and per-material reading state as
//! field-scoped partial writes. Many surfaces (lesson list, dashboard
//! rollup, admin view, reader) read and write the same record
//! concurrently; everything here is either idempotent or an accepted
//! last-write-wins overwrite.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::db::patch::UserPatch;
use crate::db::schemas::UserDoc;
use crate::db::store::UserStore;
use crate::types::{AshramError, Result};

/// Tracker over an injected user store
pub struct ProgressTracker {
    store: Arc<dyn UserStore>,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Mark one lesson complete. Idempotent: repeating the call leaves
    /// `completed` true (the timestamps advance) and never errors on an
    /// already-completed lesson. The merge touches only the three leaf
    /// fields for this lesson plus the course's lastAccessed stamp.
    pub async fn mark_lesson_complete(
        &self,
        user_id: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<()> {
        if user_id.is_empty() {
            return Err(AshramError::MissingIdentifier("userId"));
        }

        let patch = UserPatch::LessonComplete {
            course_id: course_id.to_string(),
            lesson_id: lesson_id.to_string(),
            at: Utc::now(),
        };
        self.store.merge(user_id, patch).await?;

        info!(user_id, course_id, lesson_id, "lesson completion tracked");
        Ok(())
    }

    /// Toggle a bookmark and return the resulting page list.
    ///
    /// Read-modify-write: two concurrent toggles of the same page can
    /// race and the second read may not see the first write. Accepted -
    /// bookmarking is a single-device interaction in practice.
    pub async fn toggle_bookmark(
        &self,
        user_id: &str,
        material_id: &str,
        page: u32,
    ) -> Result<Vec<u32>> {
        if user_id.is_empty() {
            return Err(AshramError::MissingIdentifier("userId"));
        }
        if material_id.is_empty() {
            return Err(AshramError::MissingIdentifier("materialId"));
        }

        let user = self.store.ensure(user_id, None).await?;

        // BTreeSet gives dedup and ascending order by construction
        let mut pages: BTreeSet<u32> = user
            .reader_state
            .get(material_id)
            .map(|state| state.bookmarks.iter().copied().collect())
            .unwrap_or_default();

        if !pages.remove(&page) {
            pages.insert(page);
        }

        let bookmarks: Vec<u32> = pages.into_iter().collect();
        let patch = UserPatch::Bookmarks {
            material_id: material_id.to_string(),
            bookmarks: bookmarks.clone(),
        };
        self.store.merge(user_id, patch).await?;

        debug!(user_id, material_id, page, "bookmark toggled");
        Ok(bookmarks)
    }

    /// Save the reading position for a material. Unconditional
    /// last-write-wins; debouncing rapid page turns is the caller's
    /// concern.
    pub async fn save_reading_position(
        &self,
        user_id: &str,
        material_id: &str,
        language: &str,
        page: u32,
    ) -> Result<()> {
        if user_id.is_empty() {
            return Err(AshramError::MissingIdentifier("userId"));
        }

        let patch = UserPatch::ReadingPosition {
            material_id: material_id.to_string(),
            language: language.to_string(),
            page,
        };
        self.store.merge(user_id, patch).await
    }

    /// Store the display theme preference
    pub async fn save_theme(&self, user_id: &str, theme: &str) -> Result<()> {
        if user_id.is_empty() {
            return Err(AshramError::MissingIdentifier("userId"));
        }
        self.store
            .merge(
                user_id,
                UserPatch::Theme {
                    theme: theme.to_string(),
                },
            )
            .await
    }
}

/// Completion percentage for a course, rounded to the nearest integer.
/// Returns 0 when the course has no lessons or no progress entries.
pub fn completion_percentage(user: &UserDoc, course_id: &str, total_lessons: u32) -> u8 {
    if total_lessons == 0 {
        return 0;
    }

    let completed = user
        .progress
        .get(course_id)
        .map(|course| course.lessons.values().filter(|l| l.completed).count())
        .unwrap_or(0);

    let percent = (completed as f64 / total_lessons as f64 * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}

/// Whether one lesson is completed; a missing entry means not completed
pub fn lesson_status(user: &UserDoc, course_id: &str, lesson_id: &str) -> bool {
    user.progress
        .get(course_id)
        .and_then(|course| course.lessons.get(lesson_id))
        .map(|lesson| lesson.completed)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryUserStore;

    fn tracker_with_store() -> (ProgressTracker, Arc<MemoryUserStore>) {
        let store = Arc::new(MemoryUserStore::new());
        (ProgressTracker::new(store.clone()), store)
    }

    #[tokio::test]
    async fn first_completion_creates_record_and_tracks() {
        let (tracker, store) = tracker_with_store();

        tracker
            .mark_lesson_complete("uid", "beginners_mind", "day1")
            .await
            .unwrap();

        let user = store.fetch("uid").await.unwrap().unwrap();
        assert!(lesson_status(&user, "beginners_mind", "day1"));
        // 1 of 7 lessons rounds to 14
        assert_eq!(completion_percentage(&user, "beginners_mind", 7), 14);
    }

    #[tokio::test]
    async fn completion_is_idempotent_and_spares_siblings() {
        let (tracker, store) = tracker_with_store();

        tracker.mark_lesson_complete("uid", "c", "day1").await.unwrap();
        tracker.mark_lesson_complete("uid", "c", "day2").await.unwrap();
        tracker.mark_lesson_complete("uid", "c", "day1").await.unwrap();

        let user = store.fetch("uid").await.unwrap().unwrap();
        let course = &user.progress["c"];
        assert_eq!(course.lessons.len(), 2);
        assert!(course.lessons["day1"].completed);
        assert!(course.lessons["day2"].completed);
        assert_eq!(completion_percentage(&user, "c", 2), 100);
    }

    #[tokio::test]
    async fn missing_identifiers_rejected_before_store_access() {
        let (tracker, store) = tracker_with_store();

        assert!(matches!(
            tracker.mark_lesson_complete("", "c", "l").await,
            Err(AshramError::MissingIdentifier("userId"))
        ));
        assert!(matches!(
            tracker.mark_lesson_complete("uid", "", "l").await,
            Err(AshramError::MissingIdentifier("courseId"))
        ));
        assert!(matches!(
            tracker.mark_lesson_complete("uid", "c", "").await,
            Err(AshramError::MissingIdentifier("lessonId"))
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn bookmark_double_toggle_round_trips() {
        let (tracker, _) = tracker_with_store();

        tracker.toggle_bookmark("uid", "gita", 3).await.unwrap();
        let with_seven = tracker.toggle_bookmark("uid", "gita", 7).await.unwrap();
        assert_eq!(with_seven, vec![3, 7]);

        tracker.toggle_bookmark("uid", "gita", 12).await.unwrap();
        let removed = tracker.toggle_bookmark("uid", "gita", 12).await.unwrap();
        assert_eq!(removed, vec![3, 7]);
    }

    #[tokio::test]
    async fn bookmarks_stay_sorted_ascending() {
        let (tracker, _) = tracker_with_store();

        tracker.toggle_bookmark("uid", "gita", 42).await.unwrap();
        tracker.toggle_bookmark("uid", "gita", 7).await.unwrap();
        let pages = tracker.toggle_bookmark("uid", "gita", 19).await.unwrap();
        assert_eq!(pages, vec![7, 19, 42]);
    }

    #[tokio::test]
    async fn reading_position_is_last_write_wins() {
        let (tracker, store) = tracker_with_store();

        tracker
            .save_reading_position("uid", "gita", "en", 10)
            .await
            .unwrap();
        tracker
            .save_reading_position("uid", "gita", "hi", 25)
            .await
            .unwrap();

        let user = store.fetch("uid").await.unwrap().unwrap();
        let state = &user.reader_state["gita"];
        assert_eq!(state.language, "hi");
        assert_eq!(state.last_page, 25);
    }

    #[tokio::test]
    async fn position_save_keeps_bookmarks_intact() {
        let (tracker, store) = tracker_with_store();

        tracker.toggle_bookmark("uid", "gita", 5).await.unwrap();
        tracker
            .save_reading_position("uid", "gita", "en", 9)
            .await
            .unwrap();

        let user = store.fetch("uid").await.unwrap().unwrap();
        assert_eq!(user.reader_state["gita"].bookmarks, vec![5]);
    }

    #[test]
    fn percentage_with_zero_total_is_zero() {
        let user = UserDoc::new("uid".into(), None);
        assert_eq!(completion_percentage(&user, "c", 0), 0);
        assert_eq!(completion_percentage(&user, "missing", 7), 0);
    }

    #[test]
    fn percentage_rounds_to_nearest() {
        let mut user = UserDoc::new("uid".into(), None);
        let course = user.progress.entry("c".into()).or_default();
        for lesson in ["a", "b"] {
            course.lessons.insert(
                lesson.into(),
                crate::db::schemas::LessonProgress {
                    completed: true,
                    completed_at: None,
                },
            );
        }

        // 2/3 = 66.7 rounds to 67
        assert_eq!(completion_percentage(&user, "c", 3), 67);
    }
}
