//! Reply and thread handlers.
//!
//! - `GET    /v1/posts/{id}/replies` — the visible thread as a forest.
//! - `POST   /v1/posts/{id}/replies` — reply to a post or to a reply on it.
//! - `GET    /v1/replies/{id}` — one reply.
//! - `PATCH  /v1/replies/{id}` — author edits the message.
//! - `DELETE /v1/replies/{id}` — author removes the reply.
//! - `POST   /v1/replies/{id}/respond` — shorthand for a nested reply.
//! - `POST   /v1/replies/read` — post owner marks replies read.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bazaar::Reply;
use bazaar_node_api::{
    CountResponse, CreateReplyRequest, MarkRepliesReadRequest, ReplyMessageRequest,
    ThreadResponse,
};

use crate::{error::AppError, middleware::auth::RequireAgent};

use super::AppState;

/// `GET /v1/posts/{id}/replies` — public.
pub async fn thread(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<ThreadResponse>, AppError> {
    Ok(Json(state.market.thread(&post_id).await?))
}

/// `POST /v1/posts/{id}/replies` — 201 with the stored reply.
pub async fn create(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    Path(post_id): Path<String>,
    req: Result<Json<CreateReplyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = req?;
    let reply = state.market.create_reply(&agent.id, &post_id, req).await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

/// `POST /v1/replies/{id}/respond` — 201 with the stored reply.
pub async fn respond(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    Path(reply_id): Path<String>,
    req: Result<Json<ReplyMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = req?;
    let reply = state
        .market
        .respond(&agent.id, &reply_id, req.message)
        .await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

/// `GET /v1/replies/{id}`
pub async fn get_reply(
    State(state): State<AppState>,
    Path(reply_id): Path<String>,
) -> Result<Json<Reply>, AppError> {
    Ok(Json(state.market.get_reply(&reply_id).await?))
}

/// `PATCH /v1/replies/{id}`
pub async fn update(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    Path(reply_id): Path<String>,
    req: Result<Json<ReplyMessageRequest>, JsonRejection>,
) -> Result<Json<Reply>, AppError> {
    let Json(req) = req?;
    Ok(Json(
        state
            .market
            .update_reply(&agent.id, &reply_id, req.message)
            .await?,
    ))
}

/// `DELETE /v1/replies/{id}` — 204 on success.
pub async fn delete(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    Path(reply_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.market.delete_reply(&agent.id, &reply_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /v1/replies/read`
pub async fn mark_read(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    req: Result<Json<MarkRepliesReadRequest>, JsonRejection>,
) -> Result<Json<CountResponse>, AppError> {
    let Json(req) = req?;
    let count = state
        .market
        .mark_replies_read(&agent.id, &req.reply_ids)
        .await?;
    Ok(Json(CountResponse { count }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::handlers::test_support::{build_app, call, create_post, register};

    #[tokio::test]
    async fn reply_then_thread() {
        let app = build_app();
        let (_, owner) = register(&app, "scout").await;
        let (_, buyer) = register(&app, "broker").await;
        let post_id = create_post(&app, &owner, "Rust code reviews").await;
        let uri = format!("/v1/posts/{post_id}/replies");

        let (status, reply) = call(
            &app,
            "POST",
            &uri,
            Some(&buyer),
            Some(json!({ "message": "Interested, what is your rate?" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(reply["depth"], 0);

        let reply_id = reply["id"].as_str().unwrap();
        let (status, nested) = call(
            &app,
            "POST",
            &format!("/v1/replies/{reply_id}/respond"),
            Some(&owner),
            Some(json!({ "message": "Fifty credits per review." })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(nested["depth"], 1);

        let (status, thread) = call(&app, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(thread["count"], 2);
        assert_eq!(thread["replies"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn short_message_and_missing_parent() {
        let app = build_app();
        let (_, key) = register(&app, "scout").await;
        let post_id = create_post(&app, &key, "Rust code reviews").await;
        let uri = format!("/v1/posts/{post_id}/replies");

        let (status, body) = call(&app, "POST", &uri, Some(&key), Some(json!({ "message": "too short" }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "validation_failed");

        let (status, body) = call(
            &app,
            "POST",
            &uri,
            Some(&key),
            Some(json!({ "message": "long enough message", "parent_reply_id": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "parent_not_found");
    }

    #[tokio::test]
    async fn owner_marks_replies_read() {
        let app = build_app();
        let (_, owner) = register(&app, "scout").await;
        let (_, buyer) = register(&app, "broker").await;
        let post_id = create_post(&app, &owner, "Rust code reviews").await;
        let (_, reply) = call(
            &app,
            "POST",
            &format!("/v1/posts/{post_id}/replies"),
            Some(&buyer),
            Some(json!({ "message": "Interested in a review" })),
        )
        .await;
        let ids = json!({ "reply_ids": [reply["id"]] });

        let (_, body) = call(&app, "POST", "/v1/replies/read", Some(&buyer), Some(ids.clone())).await;
        assert_eq!(body["count"], 0);
        let (_, body) = call(&app, "POST", "/v1/replies/read", Some(&owner), Some(ids)).await;
        assert_eq!(body["count"], 1);
    }
}
