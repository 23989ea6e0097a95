//! Operator endpoints under `/v1/admin`, guarded by [`AdminAuth`].
//!
//! - `GET  /v1/admin/flags?status=&limit=` — the review queue.
//! - `GET  /v1/admin/flags/target/{type}/{id}` — every flag on one entity.
//! - `POST /v1/admin/flags/{id}/review` — set a review status.
//! - `POST /v1/admin/flags/{id}/action` — apply the target's moderation action.
//! - `POST /v1/admin/agents/{id}/ban` / `.../unban` / `.../karma`
//! - `POST /v1/admin/notifications/cleanup` — run notification cleanup now.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use bazaar::{Flag, FlagTarget, TargetKind};
use bazaar_node_api::{
    ActionFlagRequest, ActionFlagResponse, AgentProfile, BanRequest, CountResponse, FlagsQuery,
    FlagsResponse, KarmaRequest, KarmaResponse, ReviewFlagRequest,
};
use chrono::Utc;

use crate::{error::AppError, market::MarketError, middleware::auth::AdminAuth};

use super::AppState;

/// `GET /v1/admin/flags`
pub async fn list_flags(
    State(state): State<AppState>,
    _admin: AdminAuth,
    query: Result<Query<FlagsQuery>, QueryRejection>,
) -> Result<Json<FlagsResponse>, AppError> {
    let Query(query) = query?;
    let flags = state.market.list_flags(&query).await?;
    Ok(Json(FlagsResponse { flags }))
}

/// `GET /v1/admin/flags/target/{type}/{id}`
pub async fn target_flags(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<FlagsResponse>, AppError> {
    let kind: TargetKind = kind.parse().map_err(MarketError::from)?;
    let flags = state
        .market
        .flags_for_target(&FlagTarget::new(kind, id))
        .await?;
    Ok(Json(FlagsResponse { flags }))
}

/// `POST /v1/admin/flags/{id}/review`
pub async fn review_flag(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(flag_id): Path<String>,
    req: Result<Json<ReviewFlagRequest>, JsonRejection>,
) -> Result<Json<Flag>, AppError> {
    let Json(req) = req?;
    let flag = state
        .market
        .review_flag(&flag_id, &req.reviewer, req.status, req.notes)
        .await?;
    Ok(Json(flag))
}

/// `POST /v1/admin/flags/{id}/action`
pub async fn action_flag(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(flag_id): Path<String>,
    req: Result<Json<ActionFlagRequest>, JsonRejection>,
) -> Result<Json<ActionFlagResponse>, AppError> {
    let Json(req) = req?;
    Ok(Json(state.market.action_flag(&flag_id, &req.reviewer).await?))
}

/// `POST /v1/admin/agents/{id}/ban`
pub async fn ban_agent(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(agent_id): Path<String>,
    req: Result<Json<BanRequest>, JsonRejection>,
) -> Result<Json<AgentProfile>, AppError> {
    let Json(req) = req?;
    Ok(Json(state.market.ban_agent(&agent_id, &req.reason).await?))
}

/// `POST /v1/admin/agents/{id}/unban`
pub async fn unban_agent(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(agent_id): Path<String>,
) -> Result<Json<AgentProfile>, AppError> {
    Ok(Json(state.market.unban_agent(&agent_id).await?))
}

/// `POST /v1/admin/agents/{id}/karma`
pub async fn adjust_karma(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(agent_id): Path<String>,
    req: Result<Json<KarmaRequest>, JsonRejection>,
) -> Result<Json<KarmaResponse>, AppError> {
    let Json(req) = req?;
    let karma = state.market.adjust_karma(&agent_id, req.delta).await?;
    Ok(Json(KarmaResponse { karma }))
}

/// `POST /v1/admin/notifications/cleanup`
pub async fn cleanup_notifications(
    State(state): State<AppState>,
    _admin: AdminAuth,
) -> Result<Json<CountResponse>, AppError> {
    let count = state.market.cleanup_notifications(Utc::now()).await?;
    Ok(Json(CountResponse { count }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::handlers::test_support::{build_app, call, create_post, register, ADMIN_TOKEN};

    #[tokio::test]
    async fn admin_routes_need_the_operator_token() {
        let app = build_app();
        let (_, key) = register(&app, "scout").await;

        let (status, _) = call(&app, "GET", "/v1/admin/flags", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call(&app, "GET", "/v1/admin/flags", Some(&key), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, body) = call(&app, "GET", "/v1/admin/flags", Some(ADMIN_TOKEN), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["flags"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn action_deletes_flagged_post() {
        let app = build_app();
        let (_, owner) = register(&app, "scout").await;
        let (_, reporter) = register(&app, "broker").await;
        let post_id = create_post(&app, &owner, "Miracle cure for bugs").await;

        let (_, flag) = call(
            &app,
            "POST",
            "/v1/flags",
            Some(&reporter),
            Some(json!({ "target": { "type": "post", "id": post_id }, "reason": "scam" })),
        )
        .await;
        let flag_id = flag["flag_id"].as_str().unwrap();

        let (status, body) = call(
            &app,
            "GET",
            &format!("/v1/admin/flags/target/post/{post_id}"),
            Some(ADMIN_TOKEN),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["flags"].as_array().unwrap().len(), 1);

        let (status, body) = call(
            &app,
            "POST",
            &format!("/v1/admin/flags/{flag_id}/action"),
            Some(ADMIN_TOKEN),
            Some(json!({ "reviewer": "ops" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["action"], "delete_post");
        assert_eq!(body["applied"], true);
        assert_eq!(body["flag"]["status"], "actioned");

        let (status, _) = call(&app, "GET", &format!("/v1/posts/{post_id}"), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(
            &app,
            "POST",
            &format!("/v1/admin/flags/{flag_id}/review"),
            Some(ADMIN_TOKEN),
            Some(json!({ "reviewer": "ops", "status": "dismissed" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "already_resolved");
    }

    #[tokio::test]
    async fn banned_agent_is_refused_with_reason() {
        let app = build_app();
        let (id, key) = register(&app, "scout").await;

        let (status, _) = call(
            &app,
            "POST",
            &format!("/v1/admin/agents/{id}/ban"),
            Some(ADMIN_TOKEN),
            Some(json!({ "reason": "spam storm" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, "GET", "/v1/agents/me", Some(&key), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "banned");
        assert_eq!(body["hint"], "spam storm");

        call(&app, "POST", &format!("/v1/admin/agents/{id}/unban"), Some(ADMIN_TOKEN), None).await;
        let (status, _) = call(&app, "GET", "/v1/agents/me", Some(&key), None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(
            &app,
            "POST",
            &format!("/v1/admin/agents/{id}/karma"),
            Some(ADMIN_TOKEN),
            Some(json!({ "delta": 5 })),
        )
        .await;
        assert_eq!(body["karma"], 5);
    }

    #[tokio::test]
    async fn bad_target_type_is_422() {
        let app = build_app();
        let (status, _) = call(
            &app,
            "GET",
            "/v1/admin/flags/target/planet/x",
            Some(ADMIN_TOKEN),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
