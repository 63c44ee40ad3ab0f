//! Payment signature verification
//!
//! The gateway signs `"{orderId}|{paymentId}"` with HMAC-SHA256 keyed by
//! the shared secret and hands the hex digest to the payer's client,
//! which relays it back to us. Recomputing the MAC server-side and
//! comparing is the sole proof the payment claim is authentic.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the expected hex signature for an order/payment pair.
pub fn expected_signature(order_id: &str, payment_id: &str, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a client-supplied hex signature in constant time.
/// Malformed hex counts as a mismatch, never an error.
pub fn verify(order_id: &str, payment_id: &str, secret: &str, supplied: &str) -> bool {
    let supplied_bytes = match hex::decode(supplied) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    mac.verify_slice(&supplied_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_gateway_secret";

    #[test]
    fn correct_signature_verifies() {
        let sig = expected_signature("order_1", "pay_1", SECRET);
        assert!(verify("order_1", "pay_1", SECRET, &sig));
    }

    #[test]
    fn single_character_tamper_rejected() {
        let mut sig = expected_signature("order_1", "pay_1", SECRET);
        let last = sig.pop().unwrap();
        let flipped = if last == '0' { '1' } else { '0' };
        sig.push(flipped);
        assert!(!verify("order_1", "pay_1", SECRET, &sig));
    }

    #[test]
    fn signature_binds_both_identifiers() {
        let sig = expected_signature("order_1", "pay_1", SECRET);
        assert!(!verify("order_2", "pay_1", SECRET, &sig));
        assert!(!verify("order_1", "pay_2", SECRET, &sig));
    }

    #[test]
    fn wrong_secret_rejected() {
        let sig = expected_signature("order_1", "pay_1", SECRET);
        assert!(!verify("order_1", "pay_1", "other_secret", &sig));
    }

    #[test]
    fn malformed_hex_is_a_mismatch_not_an_error() {
        assert!(!verify("order_1", "pay_1", SECRET, "not-hex-at-all"));
        assert!(!verify("order_1", "pay_1", SECRET, ""));
    }
}
