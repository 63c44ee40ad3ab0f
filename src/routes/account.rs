//! Account routes
//!
//! - POST /api/session  - bootstrap/refresh the caller's user record
//! - GET  /api/me       - record view with derived subscription state
//! - PUT  /api/me/theme - store display preference
//!
//! The subscription block in every response is recomputed from the
//! stored expiry by the ledger; the stored flag is never echoed as
//! truth on its own.

use chrono::Utc;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::schemas::{ReaderState, UserDoc};
use crate::ledger::{effective_subscription, EffectiveSubscription};
use crate::routes::helpers::{
    authenticate, cors_preflight, error_response, json_response, parse_json_body, BoxBody,
    ErrorResponse,
};
use crate::server::AppState;
use crate::types::Result;

/// Client-facing view of a user record
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub subscription: EffectiveSubscription,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    /// course id -> completed lesson ids
    pub progress: HashMap<String, Vec<String>>,
    pub reader_state: HashMap<String, ReaderState>,
}

impl UserView {
    pub fn from_record(user: &UserDoc) -> Self {
        let subscription = effective_subscription(user, Utc::now());

        let progress = user
            .progress
            .iter()
            .map(|(course_id, course)| {
                let mut completed: Vec<String> = course
                    .lessons
                    .iter()
                    .filter(|(_, lesson)| lesson.completed)
                    .map(|(id, _)| id.clone())
                    .collect();
                completed.sort();
                (course_id.clone(), completed)
            })
            .collect();

        Self {
            user_id: user.user_id.clone(),
            display_name: user.display_name.clone(),
            subscription,
            theme: user.theme.clone(),
            progress,
            reader_state: user.reader_state.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeRequest {
    theme: String,
}

/// Route /api/session and /api/me requests; None if the path is not ours
pub async fn handle_account_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().split('?').next().unwrap_or_default().to_string();
    let method = req.method().clone();

    if path != "/api/session" && path != "/api/me" && path != "/api/me/theme" {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let response = match (method, path.as_str()) {
        (Method::POST, "/api/session") => handle_session(req, state).await,
        (Method::GET, "/api/me") => handle_me(req, state).await,
        (Method::PUT, "/api/me/theme") => handle_theme(req, state).await,
        _ => Ok(json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &ErrorResponse::new("Method not allowed"),
        )),
    };

    Some(response.unwrap_or_else(error_response))
}

/// POST /api/session
///
/// First-login bootstrap: creates the record with empty progress/reader
/// maps if absent, refreshes the display name, returns the view.
async fn handle_session(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>> {
    let identity = authenticate(&req, &state)?;

    let user = state
        .store
        .ensure(&identity.user_id, identity.display_name.as_deref())
        .await?;

    Ok(json_response(StatusCode::OK, &UserView::from_record(&user)))
}

/// GET /api/me
async fn handle_me(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let identity = authenticate(&req, &state)?;
    let user = state.store.ensure(&identity.user_id, None).await?;
    Ok(json_response(StatusCode::OK, &UserView::from_record(&user)))
}

/// PUT /api/me/theme
async fn handle_theme(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let identity = authenticate(&req, &state)?;
    let max = state.args.max_body_bytes;
    let body: ThemeRequest = parse_json_body(req, max).await?;

    state.tracker.save_theme(&identity.user_id, &body.theme).await?;

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "success": true, "theme": body.theme }),
    ))
}
