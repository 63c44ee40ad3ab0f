//! Lifecycle envelope shared by every stored document
//!
//! User records and wisdom posts both carry this block; deletes are
//! soft (the `is_deleted` flag) so a lapsed-subscriber record or a
//! retracted post stays available for support lookup.

use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Creation, update, and soft-delete stamps
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Metadata {
    /// Soft-delete flag; read paths filter on it
    #[serde(default)]
    pub is_deleted: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime>,

    /// Stamped on every partial-merge write
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

impl Metadata {
    /// Fresh envelope stamped at the current instant
    pub fn new() -> Self {
        Self {
            is_deleted: false,
            deleted_at: None,
            updated_at: Some(DateTime::now()),
            created_at: Some(DateTime::now()),
        }
    }
}
