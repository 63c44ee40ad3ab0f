//! Progress and reader endpoints
//!
//! - POST /api/progress/complete              - mark a lesson complete
//! - GET  /api/progress/{courseId}?totalLessons=N - completion rollup
//! - POST /api/reader/{materialId}/bookmark   - toggle a page bookmark
//! - PUT  /api/reader/{materialId}/position   - save reading position
//!
//! All routes derive the user id from the bearer token; client bodies
//! never name a user.

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::progress::{completion_percentage, lesson_status};
use crate::routes::helpers::{
    authenticate, cors_preflight, error_response, json_response, parse_json_body, query_param,
    BoxBody, ErrorResponse,
};
use crate::server::AppState;
use crate::types::{AshramError, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompleteLessonRequest {
    course_id: String,
    lesson_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteLessonResponse {
    success: bool,
    course_id: String,
    lesson_id: String,
    completed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CourseProgressResponse {
    course_id: String,
    percent: u8,
    /// Completed lesson ids, sorted
    lessons: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BookmarkRequest {
    page: u32,
}

#[derive(Debug, Serialize)]
struct BookmarkResponse {
    bookmarks: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct PositionRequest {
    language: String,
    page: u32,
}

/// Route /api/progress/* and /api/reader/*; None otherwise
pub async fn handle_progress_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let uri = req.uri().clone();
    let path = uri.path().split('?').next().unwrap_or_default().to_string();
    let method = req.method().clone();

    if !path.starts_with("/api/progress") && !path.starts_with("/api/reader") {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let query = uri.query().unwrap_or_default().to_string();

    let response = if path == "/api/progress/complete" {
        if method == Method::POST {
            handle_complete(req, state).await
        } else {
            Ok(method_not_allowed())
        }
    } else if let Some(course_id) = path.strip_prefix("/api/progress/") {
        if method == Method::GET {
            handle_course_progress(req, state, course_id.to_string(), query).await
        } else {
            Ok(method_not_allowed())
        }
    } else if let Some(rest) = path.strip_prefix("/api/reader/") {
        let mut parts = rest.splitn(2, '/');
        let material_id = parts.next().unwrap_or_default().to_string();
        match (parts.next(), &method) {
            (Some("bookmark"), &Method::POST) => handle_bookmark(req, state, material_id).await,
            (Some("position"), &Method::PUT) => handle_position(req, state, material_id).await,
            (Some("bookmark"), _) | (Some("position"), _) => Ok(method_not_allowed()),
            _ => Ok(json_response(
                StatusCode::NOT_FOUND,
                &ErrorResponse::new("Unknown reader endpoint"),
            )),
        }
    } else {
        Ok(json_response(
            StatusCode::NOT_FOUND,
            &ErrorResponse::new("Unknown progress endpoint"),
        ))
    };

    Some(response.unwrap_or_else(error_response))
}

fn method_not_allowed() -> Response<BoxBody> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &ErrorResponse::new("Method not allowed"),
    )
}

/// POST /api/progress/complete
async fn handle_complete(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>> {
    let identity = authenticate(&req, &state)?;
    let max = state.args.max_body_bytes;
    let body: CompleteLessonRequest = parse_json_body(req, max).await?;

    state
        .tracker
        .mark_lesson_complete(&identity.user_id, &body.course_id, &body.lesson_id)
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &CompleteLessonResponse {
            success: true,
            course_id: body.course_id,
            lesson_id: body.lesson_id,
            completed: true,
        },
    ))
}

/// GET /api/progress/{courseId}?totalLessons=N
async fn handle_course_progress(
    req: Request<Incoming>,
    state: Arc<AppState>,
    course_id: String,
    query: String,
) -> Result<Response<BoxBody>> {
    let identity = authenticate(&req, &state)?;

    if course_id.is_empty() {
        return Err(AshramError::MissingIdentifier("courseId"));
    }

    let total_lessons: u32 = query_param(&query, "totalLessons")
        .map(|v| {
            v.parse()
                .map_err(|_| AshramError::BadRequest("totalLessons must be an integer".into()))
        })
        .transpose()?
        .unwrap_or(0);

    let user = state.store.ensure(&identity.user_id, None).await?;

    let mut lessons: Vec<String> = user
        .progress
        .get(&course_id)
        .map(|course| {
            course
                .lessons
                .keys()
                .filter(|lesson| lesson_status(&user, &course_id, lesson))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    lessons.sort();

    Ok(json_response(
        StatusCode::OK,
        &CourseProgressResponse {
            percent: completion_percentage(&user, &course_id, total_lessons),
            course_id,
            lessons,
        },
    ))
}

/// POST /api/reader/{materialId}/bookmark
async fn handle_bookmark(
    req: Request<Incoming>,
    state: Arc<AppState>,
    material_id: String,
) -> Result<Response<BoxBody>> {
    let identity = authenticate(&req, &state)?;
    let max = state.args.max_body_bytes;
    let body: BookmarkRequest = parse_json_body(req, max).await?;

    let bookmarks = state
        .tracker
        .toggle_bookmark(&identity.user_id, &material_id, body.page)
        .await?;

    Ok(json_response(StatusCode::OK, &BookmarkResponse { bookmarks }))
}

/// PUT /api/reader/{materialId}/position
async fn handle_position(
    req: Request<Incoming>,
    state: Arc<AppState>,
    material_id: String,
) -> Result<Response<BoxBody>> {
    let identity = authenticate(&req, &state)?;
    let max = state.args.max_body_bytes;
    let body: PositionRequest = parse_json_body(req, max).await?;

    state
        .tracker
        .save_reading_position(&identity.user_id, &material_id, &body.language, body.page)
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "success": true }),
    ))
}
