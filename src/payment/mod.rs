//! Payment verification and gateway integration
//!
//! `signature` recomputes the gateway's HMAC, `gate` is the fail-closed
//! boundary that turns a verified claim into a subscription grant, and
//! `orders` creates gateway orders for checkout.

pub mod gate;
pub mod orders;
pub mod signature;

pub use gate::{PaymentClaim, PaymentGate, VerifiedPayment};
pub use orders::{GatewayOrder, OrderClient};
