//! Authentication for Ashram
//!
//! The login ceremony happens at the external identity provider; what
//! arrives here is an HS256 bearer token carrying the opaque user id
//! and display attributes. This module validates those tokens and
//! extracts the caller's identity.

pub mod jwt;

pub use jwt::{extract_token_from_header, Identity, IdentityClaims, TokenValidator};
