//! Wisdom post schema
//!
//! Content items for the wisdom feed. Straightforward CRUD; the only
//! invariant is that `access` is one of "free" or "premium".

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for wisdom posts
pub const WISDOM_POST_COLLECTION: &str = "wisdom_posts";

/// Access tier for a wisdom post
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostAccess {
    #[default]
    Free,
    Premium,
}

/// Wisdom post stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WisdomPostDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    pub title: String,

    /// Short teaser shown to everyone regardless of tier
    pub summary: String,

    /// Full body; withheld from readers without an active subscription
    /// when `access` is premium
    pub content: String,

    #[serde(default)]
    pub access: PostAccess,

    pub author: String,

    pub created_at: DateTime,
}

impl WisdomPostDoc {
    pub fn new(
        title: String,
        summary: String,
        content: String,
        access: PostAccess,
        author: String,
    ) -> Self {
        Self {
            id: None,
            metadata: Metadata::new(),
            title,
            summary,
            content,
            access,
            author,
            created_at: DateTime::now(),
        }
    }
}

// DateTime carries no Default, so the collection-wrapper bound needs a
// manual impl; a blank post is stamped at construction time like `new`.
impl Default for WisdomPostDoc {
    fn default() -> Self {
        Self::new(
            String::new(),
            String::new(),
            String::new(),
            PostAccess::default(),
            String::new(),
        )
    }
}

impl IntoIndexes for WisdomPostDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Feed ordering: newest first
            (
                doc! { "createdAt": -1 },
                Some(
                    IndexOptions::builder()
                        .name("created_at_desc".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for WisdomPostDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_tier_round_trips_lowercase() {
        assert_eq!(serde_json::to_string(&PostAccess::Premium).unwrap(), "\"premium\"");
        let access: PostAccess = serde_json::from_str("\"free\"").unwrap();
        assert_eq!(access, PostAccess::Free);
    }

    #[test]
    fn unknown_access_tier_rejected() {
        assert!(serde_json::from_str::<PostAccess>("\"vip\"").is_err());
    }

    #[test]
    fn blank_default_is_free_tier() {
        let post = WisdomPostDoc::default();
        assert!(post.id.is_none());
        assert!(post.title.is_empty());
        assert_eq!(post.access, PostAccess::Free);
        assert!(!post.metadata.is_deleted);
    }
}
