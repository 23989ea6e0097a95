//! Bookmark handlers.
//!
//! - `POST   /v1/saved` — bookmark a post (idempotent).
//! - `GET    /v1/saved` — bookmarks with their posts.
//! - `GET    /v1/saved/{post_id}` — whether the post is bookmarked.
//! - `PATCH  /v1/saved/{post_id}` — replace the notes.
//! - `DELETE /v1/saved/{post_id}` — remove the bookmark.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bazaar::SavedPost;
use bazaar_node_api::{IsSavedResponse, SavePostRequest, SavedResponse, UpdateNotesRequest};

use crate::{error::AppError, middleware::auth::RequireAgent};

use super::AppState;

/// `POST /v1/saved` — 201 on the first save, 200 when the bookmark existed.
pub async fn save(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    req: Result<Json<SavePostRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = req?;
    let resp = state
        .market
        .save_post(&agent.id, &req.post_id, req.notes)
        .await?;
    let status = if resp.already_saved {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(resp)))
}

pub async fn list(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
) -> Result<Json<SavedResponse>, AppError> {
    let saved = state.market.list_saved(&agent.id).await?;
    Ok(Json(SavedResponse { saved }))
}

pub async fn is_saved(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    Path(post_id): Path<String>,
) -> Result<Json<IsSavedResponse>, AppError> {
    let saved = state.market.is_saved(&agent.id, &post_id).await?;
    Ok(Json(IsSavedResponse { saved }))
}

pub async fn update_notes(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    Path(post_id): Path<String>,
    req: Result<Json<UpdateNotesRequest>, JsonRejection>,
) -> Result<Json<SavedPost>, AppError> {
    let Json(req) = req?;
    Ok(Json(
        state
            .market
            .update_saved_notes(&agent.id, &post_id, req.notes)
            .await?,
    ))
}

pub async fn unsave(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    Path(post_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.market.unsave_post(&agent.id, &post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
