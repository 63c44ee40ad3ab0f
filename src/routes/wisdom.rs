//! Wisdom post endpoints
//!
//! - GET    /api/wisdom        - list posts, newest first
//! - GET    /api/wisdom/{id}   - fetch one post
//! - POST   /api/wisdom        - create (admin)
//! - PUT    /api/wisdom/{id}   - update (admin)
//! - DELETE /api/wisdom/{id}   - soft-delete (admin)
//!
//! Premium post bodies are withheld unless the caller's effective
//! subscription is active; the gate is the ledger's single derived
//! computation, same as every other read path.

use bson::{doc, oid::ObjectId, DateTime};
use chrono::Utc;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::schemas::{PostAccess, WisdomPostDoc};
use crate::db::MongoCollection;
use crate::ledger::effective_subscription;
use crate::routes::helpers::{
    authenticate, authenticate_admin, cors_preflight, error_response, json_response,
    parse_json_body, BoxBody, ErrorResponse,
};
use crate::server::AppState;
use crate::types::{AshramError, Result};

/// Client-facing view of a post; `content` is absent when locked
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WisdomPostView {
    id: String,
    title: String,
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    access: PostAccess,
    author: String,
    created_at: String,
    locked: bool,
}

impl WisdomPostView {
    fn from_doc(post: &WisdomPostDoc, subscriber: bool) -> Self {
        let locked = post.access == PostAccess::Premium && !subscriber;
        Self {
            id: post.id.map(|id| id.to_hex()).unwrap_or_default(),
            title: post.title.clone(),
            summary: post.summary.clone(),
            content: if locked {
                None
            } else {
                Some(post.content.clone())
            },
            access: post.access,
            author: post.author.clone(),
            created_at: post.created_at.to_chrono().to_rfc3339(),
            locked,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertPostRequest {
    title: String,
    summary: String,
    content: String,
    #[serde(default)]
    access: PostAccess,
    author: String,
}

/// Route /api/wisdom requests; None if the path is not ours
pub async fn handle_wisdom_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    if path != "/api/wisdom" && !path.starts_with("/api/wisdom/") {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let post_id = path.strip_prefix("/api/wisdom/").map(String::from);

    let response = match (method, post_id) {
        (Method::GET, None) => handle_list(req, state).await,
        (Method::GET, Some(id)) => handle_get(req, state, id).await,
        (Method::POST, None) => handle_create(req, state).await,
        (Method::PUT, Some(id)) => handle_update(req, state, id).await,
        (Method::DELETE, Some(id)) => handle_delete(req, state, id).await,
        _ => Ok(json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &ErrorResponse::new("Method not allowed"),
        )),
    };

    Some(response.unwrap_or_else(error_response))
}

fn posts_collection(state: &AppState) -> Result<&MongoCollection<WisdomPostDoc>> {
    state
        .posts
        .as_ref()
        .ok_or_else(|| AshramError::Database("content store not available".into()))
}

fn parse_post_id(id: &str) -> Result<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| AshramError::BadRequest(format!("invalid post id: {:?}", id)))
}

/// Whether the caller currently has an active subscription. An absent
/// or invalid token reads as an anonymous free-tier caller, not an
/// error - the list itself is public.
async fn caller_is_subscriber(req: &Request<Incoming>, state: &AppState) -> bool {
    let identity = match authenticate(req, state) {
        Ok(identity) => identity,
        Err(_) => return false,
    };

    match state.store.fetch(&identity.user_id).await {
        Ok(Some(user)) => effective_subscription(&user, Utc::now()).active,
        _ => false,
    }
}

/// GET /api/wisdom
async fn handle_list(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let subscriber = caller_is_subscriber(&req, &state).await;
    let posts = posts_collection(&state)?;

    let docs = posts
        .find_many(doc! {}, Some(doc! { "createdAt": -1 }))
        .await?;

    let views: Vec<WisdomPostView> = docs
        .iter()
        .map(|post| WisdomPostView::from_doc(post, subscriber))
        .collect();

    Ok(json_response(StatusCode::OK, &views))
}

/// GET /api/wisdom/{id}
async fn handle_get(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: String,
) -> Result<Response<BoxBody>> {
    let subscriber = caller_is_subscriber(&req, &state).await;
    let posts = posts_collection(&state)?;
    let oid = parse_post_id(&id)?;

    let post = posts
        .find_one(doc! { "_id": oid })
        .await?
        .ok_or_else(|| AshramError::NotFound(format!("post {}", id)))?;

    Ok(json_response(
        StatusCode::OK,
        &WisdomPostView::from_doc(&post, subscriber),
    ))
}

/// POST /api/wisdom (admin)
async fn handle_create(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<BoxBody>> {
    authenticate_admin(&req, &state)?;
    let max = state.args.max_body_bytes;
    let body: UpsertPostRequest = parse_json_body(req, max).await?;

    let posts = posts_collection(&state)?;
    let post = WisdomPostDoc::new(body.title, body.summary, body.content, body.access, body.author);
    let id = posts.insert_one(post).await?;

    Ok(json_response(
        StatusCode::CREATED,
        &serde_json::json!({ "id": id.to_hex() }),
    ))
}

/// PUT /api/wisdom/{id} (admin)
async fn handle_update(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: String,
) -> Result<Response<BoxBody>> {
    authenticate_admin(&req, &state)?;
    let max = state.args.max_body_bytes;
    let body: UpsertPostRequest = parse_json_body(req, max).await?;

    let posts = posts_collection(&state)?;
    let oid = parse_post_id(&id)?;

    let access = bson::to_bson(&body.access)?;
    let result = posts
        .update_one(
            doc! { "_id": oid },
            doc! {
                "$set": {
                    "title": body.title,
                    "summary": body.summary,
                    "content": body.content,
                    "access": access,
                    "author": body.author,
                    "metadata.updated_at": DateTime::now(),
                }
            },
        )
        .await?;

    if result.matched_count == 0 {
        return Err(AshramError::NotFound(format!("post {}", id)));
    }

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "success": true }),
    ))
}

/// DELETE /api/wisdom/{id} (admin)
async fn handle_delete(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: String,
) -> Result<Response<BoxBody>> {
    authenticate_admin(&req, &state)?;

    let posts = posts_collection(&state)?;
    let oid = parse_post_id(&id)?;

    let result = posts.soft_delete(doc! { "_id": oid }).await?;
    if result.matched_count == 0 {
        return Err(AshramError::NotFound(format!("post {}", id)));
    }

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "success": true }),
    ))
}
