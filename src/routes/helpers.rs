//! Shared helpers for HTTP route handlers

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::auth::{extract_token_from_header, Identity};
use crate::server::AppState;
use crate::types::{AshramError, Result};

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Standard JSON error payload
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
        }
    }

    pub fn with_code(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: Some(code.into()),
        }
    }
}

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

/// Build a JSON response with permissive CORS headers
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(full_body(json))
        .unwrap()
}

/// Map an error to its JSON response
pub fn error_response(err: AshramError) -> Response<BoxBody> {
    let status = err.status_code();
    json_response(status, &ErrorResponse::with_code(err.to_string(), err.code()))
}

/// CORS preflight response
pub fn cors_preflight() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Max-Age", "86400")
        .body(empty_body())
        .unwrap()
}

/// Read and deserialize a JSON request body, bounded by `max_bytes`
pub async fn parse_json_body<T: for<'de> Deserialize<'de>>(
    req: Request<Incoming>,
    max_bytes: usize,
) -> Result<T> {
    let body = req
        .collect()
        .await
        .map_err(|e| AshramError::BadRequest(format!("Failed to read body: {}", e)))?;

    let bytes = body.to_bytes();
    if bytes.len() > max_bytes {
        return Err(AshramError::BadRequest("Request body too large".into()));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| AshramError::BadRequest(format!("Invalid JSON: {}", e)))
}

/// Authenticate the caller from the Authorization header
pub fn authenticate(req: &Request<Incoming>, state: &AppState) -> Result<Identity> {
    let header = req
        .headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AshramError::Unauthorized("missing Authorization header".into()))?;

    let token = extract_token_from_header(header)
        .ok_or_else(|| AshramError::Unauthorized("malformed Authorization header".into()))?;

    state.tokens.validate(token)
}

/// Authenticate and require the admin claim
pub fn authenticate_admin(req: &Request<Incoming>, state: &AppState) -> Result<Identity> {
    let identity = authenticate(req, state)?;
    if !identity.is_admin {
        return Err(AshramError::Forbidden("admin access required".into()));
    }
    Ok(identity)
}

/// Parse query string into key-value pairs (no percent decoding; callers
/// only read simple numeric/id values)
pub fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let mut parts = pair.splitn(2, '=');
        if parts.next() == Some(key) {
            parts.next()
        } else {
            None
        }
    })
}
