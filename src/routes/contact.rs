//! Contact form endpoint
//!
//! POST /api/contact accepts a name, email, and message, validates that
//! all three are present, and records the submission for follow-up.
//! Delivery is out of band; the handler only acknowledges receipt.

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::routes::helpers::{
    cors_preflight, error_response, json_response, parse_json_body, BoxBody, ErrorResponse,
};
use crate::server::AppState;
use crate::types::{AshramError, Result};

#[derive(Debug, Deserialize)]
struct ContactRequest {
    name: String,
    email: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct ContactResponse {
    success: bool,
}

/// Route /api/contact requests; None if the path is not ours
pub async fn handle_contact_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    if req.uri().path() != "/api/contact" {
        return None;
    }

    match *req.method() {
        Method::OPTIONS => Some(cors_preflight()),
        Method::POST => Some(
            handle_submit(req, state)
                .await
                .unwrap_or_else(error_response),
        ),
        _ => Some(json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &ErrorResponse::new("Method not allowed"),
        )),
    }
}

async fn handle_submit(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let max = state.args.max_body_bytes;
    let body: ContactRequest = parse_json_body(req, max).await?;

    let name = body.name.trim();
    let email = body.email.trim();
    let message = body.message.trim();

    if name.is_empty() || email.is_empty() || message.is_empty() {
        return Err(AshramError::BadRequest(
            "name, email and message are all required".into(),
        ));
    }
    if !email.contains('@') {
        return Err(AshramError::BadRequest("invalid email address".into()));
    }

    info!(
        name = %name,
        email = %email,
        message_len = message.len(),
        "contact form submission received"
    );

    Ok(json_response(
        StatusCode::OK,
        &ContactResponse { success: true },
    ))
}
