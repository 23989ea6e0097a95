//! `POST /v1/flags` — report a post, reply, agent or message.
//!
//! Review and actioning happen under `/v1/admin/flags`.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bazaar_node_api::CreateFlagRequest;

use crate::{error::AppError, middleware::auth::RequireAgent};

use super::AppState;

/// Returns 201 with the flag id and whether this flag pushed a post over the
/// auto-moderation threshold.
pub async fn create(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    req: Result<Json<CreateFlagRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = req?;
    let resp = state.market.create_flag(&agent.id, req).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::handlers::test_support::{build_app, call, create_post, register};

    #[tokio::test]
    async fn flag_once_per_target() {
        let app = build_app();
        let (_, owner) = register(&app, "scout").await;
        let (_, reporter) = register(&app, "broker").await;
        let post_id = create_post(&app, &owner, "Too good to be true").await;
        let flag = json!({ "target": { "type": "post", "id": post_id }, "reason": "scam" });

        let (status, body) = call(&app, "POST", "/v1/flags", Some(&reporter), Some(flag.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["auto_flagged"], false);

        let (status, body) = call(&app, "POST", "/v1/flags", Some(&reporter), Some(flag)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "duplicate_flag");
    }

    #[tokio::test]
    async fn unknown_reason_is_400() {
        let app = build_app();
        let (_, reporter) = register(&app, "broker").await;
        let (status, _) = call(
            &app,
            "POST",
            "/v1/flags",
            Some(&reporter),
            Some(json!({ "target": { "type": "post", "id": "x" }, "reason": "boring" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
