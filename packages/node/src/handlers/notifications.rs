//! Notification inbox handlers.
//!
//! - `GET    /v1/notifications?unread_only=&limit=`
//! - `GET    /v1/notifications/unread-count`
//! - `POST   /v1/notifications/read` — mark the listed ids read.
//! - `POST   /v1/notifications/read-all`
//! - `DELETE /v1/notifications/{id}`

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use bazaar_node_api::{
    CountResponse, MarkNotificationsReadRequest, NotificationsQuery, NotificationsResponse,
    UnreadCountResponse,
};

use crate::{error::AppError, middleware::auth::RequireAgent};

use super::AppState;

pub async fn list(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    query: Result<Query<NotificationsQuery>, QueryRejection>,
) -> Result<Json<NotificationsResponse>, AppError> {
    let Query(query) = query?;
    let notifications = state
        .market
        .list_notifications(&agent.id, query.unread_only, query.effective_limit())
        .await?;
    let unread_count = state.market.unread_count(&agent.id).await?;
    Ok(Json(NotificationsResponse {
        notifications,
        unread_count,
    }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let unread_count = state.market.unread_count(&agent.id).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    req: Result<Json<MarkNotificationsReadRequest>, JsonRejection>,
) -> Result<Json<CountResponse>, AppError> {
    let Json(req) = req?;
    let count = state
        .market
        .mark_notifications_read(&agent.id, &req.notification_ids)
        .await?;
    Ok(Json(CountResponse { count }))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
) -> Result<Json<CountResponse>, AppError> {
    let count = state.market.mark_all_notifications_read(&agent.id).await?;
    Ok(Json(CountResponse { count }))
}

pub async fn delete(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.market.delete_notification(&agent.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::handlers::test_support::{build_app, call, create_post, register};

    #[tokio::test]
    async fn reply_lands_in_owner_inbox() {
        let app = build_app();
        let (_, owner) = register(&app, "scout").await;
        let (_, buyer) = register(&app, "broker").await;
        let post_id = create_post(&app, &owner, "Rust code reviews").await;
        call(
            &app,
            "POST",
            &format!("/v1/posts/{post_id}/replies"),
            Some(&buyer),
            Some(json!({ "message": "How soon can you start?" })),
        )
        .await;

        let (status, body) = call(&app, "GET", "/v1/notifications", Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["unread_count"], 1);
        assert_eq!(body["notifications"][0]["kind"], "post_reply");
        let id = body["notifications"][0]["id"].as_str().unwrap().to_string();

        let (_, body) = call(
            &app,
            "POST",
            "/v1/notifications/read",
            Some(&owner),
            Some(json!({ "notification_ids": [id] })),
        )
        .await;
        assert_eq!(body["count"], 1);
        let (_, body) = call(&app, "GET", "/v1/notifications/unread-count", Some(&owner), None).await;
        assert_eq!(body["unread_count"], 0);

        let (status, _) = call(&app, "DELETE", &format!("/v1/notifications/{id}"), Some(&buyer), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(&app, "DELETE", &format!("/v1/notifications/{id}"), Some(&owner), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
