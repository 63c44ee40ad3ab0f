//! Administrative endpoints
//!
//! - GET  /api/admin/users/{userId}               - inspect a user record
//! - POST /api/admin/users/{userId}/subscription  - override subscription fields
//!
//! Both require a bearer token whose `admin` claim is set. The override
//! goes through the same scoped-patch path as every other user write.

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::db::patch::UserPatch;
use crate::routes::account::UserView;
use crate::routes::helpers::{
    authenticate_admin, cors_preflight, error_response, json_response, parse_json_body, BoxBody,
    ErrorResponse,
};
use crate::server::AppState;
use crate::types::{AshramError, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionOverrideRequest {
    is_subscribed: bool,
    /// RFC 3339 expiry; omit to clear the stored expiry
    #[serde(default)]
    expires_at: Option<String>,
    #[serde(default)]
    plan: Option<String>,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminUserResponse {
    user: UserView,
    #[serde(skip_serializing_if = "Option::is_none")]
    admin_note: Option<String>,
}

/// Route /api/admin requests; None if the path is not ours
pub async fn handle_admin_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    let rest = path.strip_prefix("/api/admin/users/")?.to_string();

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let response = if let Some(user_id) = rest.strip_suffix("/subscription") {
        if method == Method::POST {
            handle_override(req, state, user_id.to_string()).await
        } else {
            Ok(method_not_allowed())
        }
    } else if !rest.contains('/') {
        if method == Method::GET {
            handle_inspect(req, state, rest).await
        } else {
            Ok(method_not_allowed())
        }
    } else {
        return None;
    };

    Some(response.unwrap_or_else(error_response))
}

fn method_not_allowed() -> Response<BoxBody> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &ErrorResponse::new("Method not allowed"),
    )
}

/// GET /api/admin/users/{userId}
async fn handle_inspect(
    req: Request<Incoming>,
    state: Arc<AppState>,
    user_id: String,
) -> Result<Response<BoxBody>> {
    authenticate_admin(&req, &state)?;

    let user = state
        .store
        .fetch(&user_id)
        .await?
        .ok_or_else(|| AshramError::NotFound(format!("user {}", user_id)))?;

    Ok(json_response(
        StatusCode::OK,
        &AdminUserResponse {
            user: UserView::from_record(&user),
            admin_note: user.admin_note.clone(),
        },
    ))
}

/// POST /api/admin/users/{userId}/subscription
async fn handle_override(
    req: Request<Incoming>,
    state: Arc<AppState>,
    user_id: String,
) -> Result<Response<BoxBody>> {
    let admin = authenticate_admin(&req, &state)?;
    let max = state.args.max_body_bytes;
    let body: SubscriptionOverrideRequest = parse_json_body(req, max).await?;

    let expires = match &body.expires_at {
        Some(raw) => Some(
            chrono::DateTime::parse_from_rfc3339(raw)
                .map_err(|e| AshramError::BadRequest(format!("invalid expiresAt: {}", e)))?
                .with_timezone(&chrono::Utc),
        ),
        None => None,
    };

    state.store.ensure(&user_id, None).await?;
    state
        .store
        .merge(
            &user_id,
            UserPatch::SubscriptionOverride {
                is_subscribed: body.is_subscribed,
                expires,
                plan: body.plan,
                note: body.note,
            },
        )
        .await?;

    info!(
        user_id = %user_id,
        admin = %admin.user_id,
        is_subscribed = body.is_subscribed,
        "subscription override applied"
    );

    let user = state
        .store
        .fetch(&user_id)
        .await?
        .ok_or_else(|| AshramError::Database("user record vanished after override".into()))?;

    Ok(json_response(StatusCode::OK, &UserView::from_record(&user)))
}
