//! Database layer for Ashram
//!
//! MongoDB client/collection plumbing, document schemas, the typed
//! partial-write builder, and the injectable user store (MongoDB or
//! in-memory).

pub mod memory;
pub mod mongo;
pub mod patch;
pub mod schemas;
pub mod store;

pub use memory::MemoryUserStore;
pub use mongo::{IntoIndexes, MongoClient, MongoCollection, MutMetadata};
pub use patch::UserPatch;
pub use store::{MongoUserStore, SubscriptionGrant, UserStore};
