//! Database schemas for Ashram
//!
//! Defines MongoDB document structures for user records and wisdom posts.

mod metadata;
mod user;
mod wisdom_post;

pub use metadata::Metadata;
pub use user::{
    CourseProgress, LessonProgress, PaymentRecord, ReaderState, UserDoc, USER_COLLECTION,
};
pub use wisdom_post::{PostAccess, WisdomPostDoc, WISDOM_POST_COLLECTION};
