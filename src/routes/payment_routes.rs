//! Payment endpoints
//!
//! - POST /api/create-order   - create a gateway order for checkout
//! - POST /api/verify-payment - verify a payment claim and extend the
//!                              subscription
//!
//! verify-payment's three outcomes map to distinct statuses:
//! 200 success, 400 failure (signature mismatch - no money moved on our
//! side), 500 error (verified but activation failed - money has moved,
//! needs reconciliation). Callers must not treat the last two alike.

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::ledger::Plan;
use crate::payment::PaymentClaim;
use crate::routes::helpers::{
    cors_preflight, error_response, json_response, parse_json_body, BoxBody, ErrorResponse,
};
use crate::server::AppState;
use crate::types::{AshramError, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderRequest {
    /// Amount in major currency units
    amount: i64,
    #[serde(default)]
    currency: Option<String>,
    /// The payer's user id, used as the receipt basis
    receipt_id: String,
    plan_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderResponse {
    order_id: String,
    currency: String,
    /// Amount in minor units, as registered with the gateway
    amount: i64,
    /// Public key id for the checkout widget; the secret never leaves
    /// the server
    public_key: String,
    plan_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyPaymentRequest {
    order_id: String,
    payment_id: String,
    signature: String,
    user_id: String,
    /// Minor units as reported by the checkout client; audit only
    #[serde(default)]
    amount: i64,
    plan_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyPaymentResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

/// Route /api/create-order and /api/verify-payment; None otherwise
pub async fn handle_payment_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().split('?').next().unwrap_or_default().to_string();
    let method = req.method().clone();

    if path != "/api/create-order" && path != "/api/verify-payment" {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    if method != Method::POST {
        return Some(json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &ErrorResponse::new("Method not allowed"),
        ));
    }

    let response = match path.as_str() {
        "/api/create-order" => handle_create_order(req, state).await,
        _ => return Some(handle_verify_payment(req, state).await),
    };

    Some(response.unwrap_or_else(error_response))
}

/// POST /api/create-order
async fn handle_create_order(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>> {
    let orders = state
        .orders
        .as_ref()
        .ok_or_else(|| AshramError::Config("payment gateway not configured".into()))?;

    let max = state.args.max_body_bytes;
    let body: CreateOrderRequest = parse_json_body(req, max).await?;

    // Fail-closed before touching the gateway: the plan must be one we
    // can actually grant at verification time
    Plan::from_label(&body.plan_name)?;

    let currency = body
        .currency
        .unwrap_or_else(|| state.args.currency.clone());

    let order = orders
        .create_order(body.amount, &currency, &body.receipt_id, &body.plan_name)
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &CreateOrderResponse {
            order_id: order.id,
            currency: order.currency,
            amount: order.amount,
            public_key: orders.public_key().to_string(),
            plan_name: body.plan_name,
        },
    ))
}

/// POST /api/verify-payment
async fn handle_verify_payment(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let gate = match state.gate.as_ref() {
        Some(gate) => gate,
        None => {
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &VerifyPaymentResponse {
                    status: "error",
                    message: Some("payment gateway not configured".into()),
                    user_id: None,
                },
            )
        }
    };

    let max = state.args.max_body_bytes;
    let body: VerifyPaymentRequest = match parse_json_body(req, max).await {
        Ok(body) => body,
        Err(e) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &VerifyPaymentResponse {
                    status: "failure",
                    message: Some(e.to_string()),
                    user_id: None,
                },
            )
        }
    };

    let claim = PaymentClaim {
        order_id: body.order_id,
        payment_id: body.payment_id,
        signature: body.signature,
        user_id: body.user_id,
        amount: body.amount,
        plan_name: body.plan_name,
    };

    match gate.verify_and_apply(claim).await {
        Ok(verified) => json_response(
            StatusCode::OK,
            &VerifyPaymentResponse {
                status: "success",
                message: Some("Payment verified and subscription activated".into()),
                user_id: Some(verified.user_id),
            },
        ),
        // Client-trust failures: reject, nothing stored, no support action
        Err(
            err @ (AshramError::SignatureMismatch
            | AshramError::MissingIdentifier(_)
            | AshramError::BadRequest(_)),
        ) => json_response(
            StatusCode::BAD_REQUEST,
            &VerifyPaymentResponse {
                status: "failure",
                message: Some(err.to_string()),
                user_id: None,
            },
        ),
        // Infrastructure failures after a verified signature: money has
        // moved at the gateway, escalate
        Err(err) => {
            error!(error = %err, "verified payment could not be activated");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &VerifyPaymentResponse {
                    status: "error",
                    message: Some("Internal error during verification".into()),
                    user_id: None,
                },
            )
        }
    }
}
