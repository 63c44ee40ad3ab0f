//! Ashram - subscription and progress sync gateway
//!
//! HTTP gateway for a content platform: a subscription ledger with
//! cumulative extension, an HMAC payment verification gate, and an
//! idempotent course/reader progress tracker, backed by MongoDB.
//!
//! ## Services
//!
//! - **Ledger**: derived subscription state with stacking extensions
//! - **Payments**: gateway order creation and signed-claim verification
//! - **Progress**: lesson completion, bookmarks, reading positions
//! - **Wisdom**: content feed with premium gating

pub mod auth;
pub mod config;
pub mod db;
pub mod ledger;
pub mod payment;
pub mod progress;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{AshramError, Result};
