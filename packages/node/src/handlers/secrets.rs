//! Secret registry handlers.
//!
//! Values are write-only: no route ever returns one.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bazaar_node_api::{AddSecretRequest, SecretsResponse};

use crate::{error::AppError, market::secrets::SecretRef, middleware::auth::RequireAgent};

use super::AppState;

/// `POST /v1/secrets` — register a secret value. Returns 201 with its summary.
pub async fn add(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    req: Result<Json<AddSecretRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = req?;
    let summary = state.market.add_secret(&agent.id, req).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// `GET /v1/secrets`
pub async fn list(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
) -> Result<Json<SecretsResponse>, AppError> {
    let secrets = state.market.list_secrets(&agent.id).await?;
    Ok(Json(SecretsResponse { secrets }))
}

/// `DELETE /v1/secrets/{id_or_name}` — the segment is taken as an id when
/// it parses as one, otherwise as the secret's name.
pub async fn remove(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    Path(id_or_name): Path<String>,
) -> Result<StatusCode, AppError> {
    let secret = if uuid::Uuid::parse_str(&id_or_name).is_ok() {
        SecretRef::Id(&id_or_name)
    } else {
        SecretRef::Name(&id_or_name)
    };
    state.market.remove_secret(&agent.id, secret).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::handlers::test_support::{build_app, call, register};

    #[tokio::test]
    async fn values_never_come_back() {
        let app = build_app();
        let (_, key) = register(&app, "scout").await;

        let (status, body) = call(
            &app,
            "POST",
            "/v1/secrets",
            Some(&key),
            Some(json!({ "name": "openai", "value": "sk-live-0123456789" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(!body.to_string().contains("sk-live-0123456789"));

        let (status, body) = call(&app, "GET", "/v1/secrets", Some(&key), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["secrets"][0]["name"], "openai");
        assert!(!body.to_string().contains("sk-live-0123456789"));
    }

    #[tokio::test]
    async fn remove_by_name_then_by_id() {
        let app = build_app();
        let (_, key) = register(&app, "scout").await;
        for name in ["one", "two"] {
            call(
                &app,
                "POST",
                "/v1/secrets",
                Some(&key),
                Some(json!({ "name": name, "value": format!("{name}-value-xyz") })),
            )
            .await;
        }

        let (status, _) = call(&app, "DELETE", "/v1/secrets/one", Some(&key), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = call(&app, "GET", "/v1/secrets", Some(&key), None).await;
        let id = body["secrets"][0]["id"].as_str().unwrap().to_string();
        let (status, _) = call(&app, "DELETE", &format!("/v1/secrets/{id}"), Some(&key), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = call(&app, "DELETE", "/v1/secrets/one", Some(&key), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
