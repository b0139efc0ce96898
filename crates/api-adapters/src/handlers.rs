//! # Handlers
//!
//! Translate HTTP requests into service calls. Handlers own no business
//! rules beyond request shape: ids come from the path, the acting user from
//! `ActingUser`, and everything else is delegated.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domains::{DomainError, NewPost, UserId};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::ActingUser;
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostBody {
    pub posted_by: Option<String>,
    pub text: Option<String>,
    pub img: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyBody {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReplyBody {
    pub update_reply: Option<String>,
}

/// A path id that is not a UUID cannot name a stored entity.
fn parse_id(raw: &str, entity: &'static str) -> Result<Uuid, ApiError> {
    raw.parse::<Uuid>()
        .map_err(|_| ApiError(DomainError::not_found(entity, raw)))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

pub async fn create_post(
    State(state): State<AppState>,
    ActingUser(actor): ActingUser,
    payload: Result<Json<CreatePostBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let CreatePostBody { posted_by, text, img } = body(payload)?;
    let (Some(posted_by), Some(text)) = (posted_by, text) else {
        return Err(ApiError::bad_request("postedBy and text fields are required"));
    };
    let posted_by: UserId = parse_id(&posted_by, "User")?;

    let result = state
        .posts
        .create(actor, NewPost { posted_by, text, img })
        .await;
    state.metrics.observe("create_post", &result);
    Ok((StatusCode::CREATED, Json(result?)))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let post_id = parse_id(&post_id, "Post")?;
    let result = state.posts.get(post_id).await;
    state.metrics.observe("get_post", &result);
    Ok(Json(result?))
}

pub async fn delete_post(
    State(state): State<AppState>,
    ActingUser(actor): ActingUser,
    Path(post_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let post_id = parse_id(&post_id, "Post")?;
    let result = state.posts.delete(post_id, actor).await;
    state.metrics.observe("delete_post", &result);
    result?;
    Ok(Json(json!({ "message": "Post deleted successfully" })))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    ActingUser(actor): ActingUser,
    Path(post_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let post_id = parse_id(&post_id, "Post")?;
    let result = state.likes.toggle(post_id, actor).await;
    state.metrics.observe("toggle_like", &result);
    Ok(Json(json!({ "state": result? })))
}

pub async fn add_reply(
    State(state): State<AppState>,
    ActingUser(actor): ActingUser,
    Path(post_id): Path<String>,
    payload: Result<Json<ReplyBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let post_id = parse_id(&post_id, "Post")?;
    let text = body(payload)?.text.unwrap_or_default();
    let result = state.replies.add_reply(post_id, actor, text).await;
    state.metrics.observe("add_reply", &result);
    Ok(Json(result?))
}

pub async fn edit_reply(
    State(state): State<AppState>,
    ActingUser(_actor): ActingUser,
    Path((post_id, reply_id)): Path<(String, String)>,
    payload: Result<Json<UpdateReplyBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let post_id = parse_id(&post_id, "Post")?;
    let reply_id = parse_id(&reply_id, "Reply")?;
    let text = body(payload)?.update_reply.unwrap_or_default();
    let result = state.replies.edit_reply(post_id, reply_id, &text).await;
    state.metrics.observe("edit_reply", &result);
    result?;
    Ok(Json(json!({ "message": "Reply updated successfully" })))
}

pub async fn delete_reply(
    State(state): State<AppState>,
    ActingUser(_actor): ActingUser,
    Path((post_id, reply_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let post_id = parse_id(&post_id, "Post")?;
    let reply_id = parse_id(&reply_id, "Reply")?;
    let result = state.replies.delete_reply(post_id, reply_id).await;
    state.metrics.observe("delete_reply", &result);
    result?;
    Ok(Json(json!({ "message": "Reply deleted successfully" })))
}

pub async fn feed(
    State(state): State<AppState>,
    ActingUser(actor): ActingUser,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.feed.user_feed(actor).await;
    state.metrics.observe("feed", &result);
    Ok(Json(result?))
}

pub async fn user_posts(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.feed.authored_posts(&username).await;
    state.metrics.observe("user_posts", &result);
    Ok(Json(result?))
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| ApiError(DomainError::internal(format!("metrics encoding failed: {e}"))))?;
    Ok((
        [(
            axum::http::header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        body,
    ))
}
