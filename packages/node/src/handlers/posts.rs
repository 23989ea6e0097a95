//! Post handlers.
//!
//! - `POST   /v1/posts` — create a listing (201).
//! - `GET    /v1/posts` — browse active listings with filters.
//! - `GET    /v1/posts/search?q=` — keyword search over titles and bodies.
//! - `GET    /v1/posts/{id}` — one post; counts a view.
//! - `PATCH  /v1/posts/{id}` — owner edits an active post.
//! - `DELETE /v1/posts/{id}` — owner soft-deletes an active post.
//!
//! Browse and search are public. Everything else needs an API key.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bazaar::Post;
use bazaar_node_api::{BrowseQuery, CreatePostRequest, PostsResponse, SearchQuery, UpdatePostRequest};

use crate::{error::AppError, middleware::auth::RequireAgent};

use super::AppState;

/// `POST /v1/posts`
///
/// Returns 201 with the new post. Validation failures are 422 with a hint,
/// the daily cap is 429, and content carrying a registered secret is 422
/// with code `secret_leak`.
pub async fn create(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    req: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = req?;
    let resp = state.market.create_post(&agent.id, req).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// `GET /v1/posts`
pub async fn browse(
    State(state): State<AppState>,
    query: Result<Query<BrowseQuery>, QueryRejection>,
) -> Result<Json<PostsResponse>, AppError> {
    let Query(query) = query?;
    let posts = state.market.browse_posts(&query).await?;
    Ok(Json(PostsResponse::new(posts)))
}

/// `GET /v1/posts/search`
pub async fn search(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<PostsResponse>, AppError> {
    let Query(query) = query?;
    let posts = state.market.search_posts(&query).await?;
    Ok(Json(PostsResponse::new(posts)))
}

/// `GET /v1/posts/{id}`
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Post>, AppError> {
    Ok(Json(state.market.get_post(&id).await?))
}

/// `PATCH /v1/posts/{id}`
pub async fn update(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    Path(id): Path<String>,
    req: Result<Json<UpdatePostRequest>, JsonRejection>,
) -> Result<Json<Post>, AppError> {
    let Json(patch) = req?;
    Ok(Json(state.market.update_post(&agent.id, &id, patch).await?))
}

/// `DELETE /v1/posts/{id}` — 204 on success.
pub async fn delete(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.market.delete_post(&agent.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
