//! Payment gateway order creation
//!
//! Thin client for the gateway's order API. Amounts arrive in major
//! currency units and are converted to minor units on the wire. The
//! receipt string is capped under the gateway's 40-character limit by
//! truncating the user id and appending a time-based suffix.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use crate::types::{AshramError, Result};

/// Longest user-id prefix carried in a receipt string
const RECEIPT_ID_PREFIX_LEN: usize = 20;

/// Order as returned by the gateway
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub currency: String,
    /// Amount in minor units
    pub amount: i64,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    payment_capture: u8,
    notes: OrderNotes<'a>,
}

#[derive(Debug, Serialize)]
struct OrderNotes<'a> {
    #[serde(rename = "planName")]
    plan_name: &'a str,
}

/// Client for the payment gateway's order API
pub struct OrderClient {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl OrderClient {
    pub fn new(
        base_url: String,
        key_id: String,
        key_secret: String,
        timeout_ms: u64,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| AshramError::Config(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            key_id,
            key_secret,
        })
    }

    /// The public key id, safe to hand to checkout clients
    pub fn public_key(&self) -> &str {
        &self.key_id
    }

    /// Create a gateway order for `amount_major` units of `currency`.
    ///
    /// A timeout here is surfaced as `GatewayUnknown`: the order may or
    /// may not exist at the gateway, and re-creating blindly risks a
    /// double charge downstream.
    pub async fn create_order(
        &self,
        amount_major: i64,
        currency: &str,
        receipt_id: &str,
        plan_name: &str,
    ) -> Result<GatewayOrder> {
        if amount_major < 1 {
            return Err(AshramError::BadRequest("Invalid amount".into()));
        }
        if receipt_id.is_empty() {
            return Err(AshramError::MissingIdentifier("receiptId"));
        }

        // Client-supplied amount; the minor-unit conversion must not wrap
        let amount_minor = amount_major
            .checked_mul(100)
            .ok_or_else(|| AshramError::BadRequest("Invalid amount".into()))?;

        let receipt = build_receipt(receipt_id);
        let body = CreateOrderBody {
            amount: amount_minor,
            currency,
            receipt: &receipt,
            payment_capture: 1,
            notes: OrderNotes { plan_name },
        };

        debug!(receipt = %receipt, amount_minor = body.amount, "creating gateway order");

        let response = self
            .http
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AshramError::Gateway(format!(
                "order creation failed ({}): {}",
                status, detail
            )));
        }

        let order: GatewayOrder = response
            .json()
            .await
            .map_err(|e| AshramError::Gateway(format!("malformed order response: {}", e)))?;

        info!(order_id = %order.id, amount_minor = order.amount, "gateway order created");
        Ok(order)
    }
}

/// Build a receipt string unique enough for support lookup and always
/// under the gateway's 40-character limit: a truncated user id plus the
/// last six digits of the current epoch milliseconds.
fn build_receipt(receipt_id: &str) -> String {
    let prefix: String = receipt_id.chars().take(RECEIPT_ID_PREFIX_LEN).collect();

    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let suffix = millis % 1_000_000;

    format!("user_{}_{:06}", prefix, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_stays_under_gateway_limit() {
        let long_id = "x".repeat(128);
        let receipt = build_receipt(&long_id);
        assert!(receipt.len() < 40, "receipt too long: {}", receipt.len());
        assert!(receipt.starts_with("user_xxxxxxxxxxxxxxxxxxxx_"));
    }

    #[test]
    fn receipt_keeps_short_ids_whole() {
        let receipt = build_receipt("uid42");
        assert!(receipt.starts_with("user_uid42_"));
        assert!(receipt.len() < 40);
    }

    #[test]
    fn client_rejects_zero_amount_locally() {
        let client = OrderClient::new(
            "https://gateway.invalid".into(),
            "key".into(),
            "secret".into(),
            1000,
        )
        .unwrap();

        let err = tokio_test::block_on(client.create_order(0, "INR", "uid", "Yogi Monthly"))
            .unwrap_err();
        assert!(matches!(err, AshramError::BadRequest(_)));
    }

    #[test]
    fn client_rejects_amount_that_overflows_minor_units() {
        let client = OrderClient::new(
            "https://gateway.invalid".into(),
            "key".into(),
            "secret".into(),
            1000,
        )
        .unwrap();

        let err = tokio_test::block_on(client.create_order(
            i64::MAX / 2,
            "INR",
            "uid",
            "Yogi Monthly",
        ))
        .unwrap_err();
        assert!(matches!(err, AshramError::BadRequest(_)));
    }
}
