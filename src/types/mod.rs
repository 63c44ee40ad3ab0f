//! Shared types for Ashram

mod error;

pub use error::{AshramError, Result};
