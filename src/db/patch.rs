//! Scoped partial writes against the user record
//!
//! Every mutation the tracker and admin paths perform is one of the
//! variants below. The variant is turned into dotted `$set` field paths
//! in exactly one place, so call sites never interpolate path strings
//! and a patch can never clobber sibling entries in a nested map.

use bson::{doc, Bson, DateTime, Document};
use chrono::{DateTime as ChronoDateTime, Utc};

use crate::db::schemas::{LessonProgress, ReaderState, UserDoc};
use crate::types::{AshramError, Result};

/// Key reserved for the per-course access stamp; lesson ids may not use it.
const LAST_ACCESSED_KEY: &str = "lastAccessed";

/// A field-scoped partial write to one user record
#[derive(Debug, Clone)]
pub enum UserPatch {
    /// Mark one lesson complete and stamp the course's lastAccessed.
    /// Touches exactly three leaf fields; sibling lessons are untouched.
    LessonComplete {
        course_id: String,
        lesson_id: String,
        at: ChronoDateTime<Utc>,
    },

    /// Replace the bookmark list for one material (already deduplicated
    /// and sorted ascending by the tracker)
    Bookmarks {
        material_id: String,
        bookmarks: Vec<u32>,
    },

    /// Last-write-wins reading position for one material
    ReadingPosition {
        material_id: String,
        language: String,
        page: u32,
    },

    /// Display preference
    Theme { theme: String },

    /// Administrative override of the subscription fields
    SubscriptionOverride {
        is_subscribed: bool,
        expires: Option<ChronoDateTime<Utc>>,
        plan: Option<String>,
        note: Option<String>,
    },
}

/// Reject identifier segments that would break a dotted field path or
/// collide with the reserved lastAccessed key.
fn validate_segment(kind: &'static str, segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(AshramError::MissingIdentifier(kind));
    }
    if segment.contains('.') || segment.contains('$') || segment.contains('\0') {
        return Err(AshramError::BadRequest(format!(
            "invalid {}: {:?}",
            kind, segment
        )));
    }
    Ok(())
}

impl UserPatch {
    /// Validate all identifier segments before any network call
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::LessonComplete {
                course_id,
                lesson_id,
                ..
            } => {
                validate_segment("courseId", course_id)?;
                validate_segment("lessonId", lesson_id)?;
                if lesson_id == LAST_ACCESSED_KEY {
                    return Err(AshramError::BadRequest(format!(
                        "lessonId {:?} is reserved",
                        lesson_id
                    )));
                }
                Ok(())
            }
            Self::Bookmarks { material_id, .. } => validate_segment("materialId", material_id),
            Self::ReadingPosition {
                material_id,
                language,
                ..
            } => {
                validate_segment("materialId", material_id)?;
                validate_segment("language", language)
            }
            // theme is a value in a fixed top-level field, not a path
            // segment; only emptiness is rejected
            Self::Theme { theme } => {
                if theme.is_empty() {
                    return Err(AshramError::MissingIdentifier("theme"));
                }
                Ok(())
            }
            Self::SubscriptionOverride { .. } => Ok(()),
        }
    }

    /// Build the MongoDB update document for this patch
    pub fn update_document(&self) -> Result<Document> {
        self.validate()?;

        let mut set = doc! { "metadata.updated_at": DateTime::now() };
        let mut unset = Document::new();

        match self {
            Self::LessonComplete {
                course_id,
                lesson_id,
                at,
            } => {
                let stamp = DateTime::from_chrono(*at);
                set.insert(
                    format!("progress.{}.{}.completed", course_id, lesson_id),
                    true,
                );
                set.insert(
                    format!("progress.{}.{}.completedAt", course_id, lesson_id),
                    stamp,
                );
                set.insert(
                    format!("progress.{}.{}", course_id, LAST_ACCESSED_KEY),
                    stamp,
                );
            }
            Self::Bookmarks {
                material_id,
                bookmarks,
            } => {
                let pages: Vec<i64> = bookmarks.iter().map(|p| *p as i64).collect();
                set.insert(format!("readerState.{}.bookmarks", material_id), pages);
            }
            Self::ReadingPosition {
                material_id,
                language,
                page,
            } => {
                set.insert(
                    format!("readerState.{}.language", material_id),
                    language.as_str(),
                );
                set.insert(format!("readerState.{}.lastPage", material_id), *page as i64);
            }
            Self::Theme { theme } => {
                set.insert("theme", theme.as_str());
            }
            Self::SubscriptionOverride {
                is_subscribed,
                expires,
                plan,
                note,
            } => {
                set.insert("isSubscribed", *is_subscribed);
                match expires {
                    Some(at) => {
                        set.insert("subscriptionExpires", DateTime::from_chrono(*at));
                    }
                    None => {
                        unset.insert("subscriptionExpires", Bson::Null);
                    }
                }
                if let Some(plan) = plan {
                    set.insert("subscriptionPlan", plan.as_str());
                }
                if let Some(note) = note {
                    set.insert("adminNote", note.as_str());
                }
            }
        }

        let mut update = doc! { "$set": set };
        if !unset.is_empty() {
            update.insert("$unset", unset);
        }
        Ok(update)
    }

    /// Apply this patch structurally to an in-memory record. Mirrors the
    /// field-path semantics of `update_document` for the memory store.
    pub fn apply_to(&self, user: &mut UserDoc) -> Result<()> {
        self.validate()?;

        user.metadata.updated_at = Some(DateTime::now());

        match self {
            Self::LessonComplete {
                course_id,
                lesson_id,
                at,
            } => {
                let stamp = DateTime::from_chrono(*at);
                let course = user.progress.entry(course_id.clone()).or_default();
                let lesson = course.lessons.entry(lesson_id.clone()).or_insert_with(
                    LessonProgress::default,
                );
                lesson.completed = true;
                lesson.completed_at = Some(stamp);
                course.last_accessed = Some(stamp);
            }
            Self::Bookmarks {
                material_id,
                bookmarks,
            } => {
                let state = user
                    .reader_state
                    .entry(material_id.clone())
                    .or_insert_with(ReaderState::default);
                state.bookmarks = bookmarks.clone();
            }
            Self::ReadingPosition {
                material_id,
                language,
                page,
            } => {
                let state = user
                    .reader_state
                    .entry(material_id.clone())
                    .or_insert_with(ReaderState::default);
                state.language = language.clone();
                state.last_page = *page;
            }
            Self::Theme { theme } => {
                user.theme = Some(theme.clone());
            }
            Self::SubscriptionOverride {
                is_subscribed,
                expires,
                plan,
                note,
            } => {
                user.is_subscribed = *is_subscribed;
                user.subscription_expires = expires.map(DateTime::from_chrono);
                if let Some(plan) = plan {
                    user.subscription_plan = Some(plan.clone());
                }
                if let Some(note) = note {
                    user.admin_note = Some(note.clone());
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesson_complete_sets_exactly_three_leaf_paths() {
        let patch = UserPatch::LessonComplete {
            course_id: "beginners_mind".into(),
            lesson_id: "day1".into(),
            at: Utc::now(),
        };

        let update = patch.update_document().unwrap();
        let set = update.get_document("$set").unwrap();

        assert!(set.contains_key("progress.beginners_mind.day1.completed"));
        assert!(set.contains_key("progress.beginners_mind.day1.completedAt"));
        assert!(set.contains_key("progress.beginners_mind.lastAccessed"));
        // Three progress paths plus the metadata stamp, nothing broader
        assert_eq!(set.len(), 4);
        assert!(!set.contains_key("progress"));
        assert!(!set.contains_key("progress.beginners_mind"));
    }

    #[test]
    fn empty_identifiers_rejected_before_any_write() {
        let patch = UserPatch::LessonComplete {
            course_id: "".into(),
            lesson_id: "day1".into(),
            at: Utc::now(),
        };
        assert!(matches!(
            patch.update_document(),
            Err(AshramError::MissingIdentifier("courseId"))
        ));
    }

    #[test]
    fn path_breaking_identifiers_rejected() {
        let patch = UserPatch::Bookmarks {
            material_id: "gita.en".into(),
            bookmarks: vec![1],
        };
        assert!(matches!(
            patch.update_document(),
            Err(AshramError::BadRequest(_))
        ));
    }

    #[test]
    fn theme_values_may_contain_path_characters() {
        let patch = UserPatch::Theme {
            theme: "solarized.dark".into(),
        };
        let update = patch.update_document().unwrap();
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("theme").unwrap(), "solarized.dark");

        let empty = UserPatch::Theme { theme: "".into() };
        assert!(matches!(
            empty.update_document(),
            Err(AshramError::MissingIdentifier("theme"))
        ));
    }

    #[test]
    fn reserved_lesson_id_rejected() {
        let patch = UserPatch::LessonComplete {
            course_id: "c".into(),
            lesson_id: "lastAccessed".into(),
            at: Utc::now(),
        };
        assert!(patch.update_document().is_err());
    }

    #[test]
    fn apply_to_does_not_clobber_sibling_lessons() {
        let mut user = UserDoc::new("uid".into(), None);
        let day1 = UserPatch::LessonComplete {
            course_id: "c".into(),
            lesson_id: "day1".into(),
            at: Utc::now(),
        };
        let day2 = UserPatch::LessonComplete {
            course_id: "c".into(),
            lesson_id: "day2".into(),
            at: Utc::now(),
        };

        day1.apply_to(&mut user).unwrap();
        day2.apply_to(&mut user).unwrap();

        let course = &user.progress["c"];
        assert!(course.lessons["day1"].completed);
        assert!(course.lessons["day2"].completed);
    }

    #[test]
    fn override_without_expiry_unsets_the_field() {
        let patch = UserPatch::SubscriptionOverride {
            is_subscribed: true,
            expires: None,
            plan: None,
            note: Some("manual grant".into()),
        };

        let update = patch.update_document().unwrap();
        assert!(update.get_document("$unset").unwrap().contains_key("subscriptionExpires"));
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_bool("isSubscribed").unwrap(), true);
        assert_eq!(set.get_str("adminNote").unwrap(), "manual grant");
    }
}
