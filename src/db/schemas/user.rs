//! User record schema
//!
//! One document per identity-provider user id. Holds the subscription
//! fields owned by the payment gate, the per-course progress map, and
//! per-material reader state. `isSubscribed` is a stored legacy flag;
//! readers must derive the effective state from `subscriptionExpires`
//! (see the ledger module).

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for user records
pub const USER_COLLECTION: &str = "users";

/// Completion state for a single lesson. A missing entry means the
/// lesson is not completed.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgress {
    #[serde(default)]
    pub completed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime>,
}

/// Per-course progress: a lastAccessed stamp plus lesson entries keyed
/// by lesson id. The lesson map is flattened so the wire layout is
/// `progress.{courseId}.{lessonId}` with `lastAccessed` as a sibling
/// key; lesson ids therefore may not use the reserved `lastAccessed`
/// name (enforced by the patch builder).
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime>,

    #[serde(flatten)]
    pub lessons: HashMap<String, LessonProgress>,
}

/// Reading state for one material (language edition, position, bookmarks).
/// `bookmarks` is kept sorted ascending with no duplicates.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReaderState {
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_page")]
    pub last_page: u32,

    #[serde(default)]
    pub bookmarks: Vec<u32>,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_page() -> u32 {
    1
}

impl Default for ReaderState {
    fn default() -> Self {
        Self {
            language: default_language(),
            last_page: default_page(),
            bookmarks: Vec::new(),
        }
    }
}

/// Trusted gateway identifiers from the last verified payment.
/// Write-once per transaction, audit/support only - never consulted
/// for access decisions.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
    /// Amount in minor currency units as reported at verification
    pub amount: i64,
}

/// User record stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Opaque stable identifier from the identity provider
    pub user_id: String,

    /// Display name from the identity provider (refreshed on session bootstrap)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Stored legacy flag; only authoritative when subscriptionExpires is absent
    #[serde(default)]
    pub is_subscribed: bool,

    /// Authoritative subscription expiry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_expires: Option<DateTime>,

    /// Plan label from the last extension (may go stale after lapse)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_plan: Option<String>,

    /// When the last verified payment was applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_subscription_date: Option<DateTime>,

    /// Gateway identifiers from the last verified payment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_payment: Option<PaymentRecord>,

    /// course id -> per-course progress
    #[serde(default)]
    pub progress: HashMap<String, CourseProgress>,

    /// material id -> reader state
    #[serde(default)]
    pub reader_state: HashMap<String, ReaderState>,

    /// Display preference, stored on the same record but irrelevant to
    /// access decisions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,

    /// Support note from the admin override path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_note: Option<String>,
}

impl UserDoc {
    /// Create a fresh record with empty (not absent) progress/reader maps
    pub fn new(user_id: String, display_name: Option<String>) -> Self {
        Self {
            id: None,
            metadata: Metadata::new(),
            user_id,
            display_name,
            is_subscribed: false,
            subscription_expires: None,
            subscription_plan: None,
            last_subscription_date: None,
            last_payment: None,
            progress: HashMap::new(),
            reader_state: HashMap::new(),
            theme: None,
            admin_note: None,
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on the identity-provider user id; doubles as
            // the guard against duplicate records from concurrent
            // first-login bootstraps
            (
                doc! { "userId": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("user_id_unique".to_string())
                        .build(),
                ),
            ),
            // Expiry index for admin listings of lapsed/active users
            (
                doc! { "subscriptionExpires": 1 },
                Some(
                    IndexOptions::builder()
                        .name("subscription_expires_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_has_empty_maps_not_absent() {
        let user = UserDoc::new("uid_1".into(), Some("Asha".into()));
        assert!(user.progress.is_empty());
        assert!(user.reader_state.is_empty());
        assert!(!user.is_subscribed);
        assert!(user.subscription_expires.is_none());
    }

    #[test]
    fn course_progress_flattens_lesson_entries() {
        let mut course = CourseProgress::default();
        course.last_accessed = Some(DateTime::now());
        course.lessons.insert(
            "day1".to_string(),
            LessonProgress {
                completed: true,
                completed_at: Some(DateTime::now()),
            },
        );

        let value = serde_json::to_value(&course).unwrap();
        // Lesson entries sit alongside lastAccessed, not under a "lessons" key
        assert!(value.get("day1").is_some());
        assert!(value.get("lessons").is_none());
        assert!(value.get("lastAccessed").is_some());
        assert_eq!(value["day1"]["completed"], true);
    }

    #[test]
    fn missing_lesson_entry_deserializes_as_not_completed() {
        let course: CourseProgress = serde_json::from_str(r#"{"day1": {}}"#).unwrap();
        assert!(!course.lessons["day1"].completed);
        assert!(course.lessons["day1"].completed_at.is_none());
    }
}
