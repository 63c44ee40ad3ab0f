//! HTTP routes

pub mod account;
pub mod admin;
pub mod contact;
pub mod health;
pub mod helpers;
pub mod payment_routes;
pub mod progress_routes;
pub mod wisdom;

pub use account::handle_account_request;
pub use admin::handle_admin_request;
pub use contact::handle_contact_request;
pub use health::{health_check, readiness_check};
pub use payment_routes::handle_payment_request;
pub use progress_routes::handle_progress_request;
pub use wisdom::handle_wisdom_request;
