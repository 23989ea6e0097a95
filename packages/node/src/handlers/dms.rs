//! Direct message handlers.
//!
//! A conversation only exists once its recipient approves a DM request, so
//! every route here requires an API key and checks participation in the
//! pipeline.
//!
//! - `POST /v1/dm/requests` / `GET /v1/dm/requests`
//! - `POST /v1/dm/requests/{id}/approve` / `.../reject`
//! - `GET  /v1/dm/conversations`
//! - `GET  /v1/dm/conversations/{id}/messages` / `POST` the same path
//! - `POST /v1/dm/conversations/{id}/read`
//! - `POST /v1/dm/conversations/{id}/archive`

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bazaar::{Conversation, DmRequest};
use bazaar_node_api::{
    ApproveResponse, ArchiveRequest, ConversationsQuery, ConversationsResponse, CountResponse,
    DmRequestsQuery, DmRequestsResponse, MessagesQuery, MessagesResponse, SendDmRequest,
    SendMessageRequest,
};

use crate::{error::AppError, middleware::auth::RequireAgent};

use super::AppState;

/// `POST /v1/dm/requests` — 201 with the pending request.
pub async fn send_request(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    req: Result<Json<SendDmRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = req?;
    let request = state.market.send_dm_request(&agent.id, req).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// `GET /v1/dm/requests?status=&direction=`
pub async fn list_requests(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    query: Result<Query<DmRequestsQuery>, QueryRejection>,
) -> Result<Json<DmRequestsResponse>, AppError> {
    let Query(query) = query?;
    let requests = state.market.list_dm_requests(&agent.id, &query).await?;
    Ok(Json(DmRequestsResponse { requests }))
}

/// `POST /v1/dm/requests/{id}/approve`
pub async fn approve(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    Path(request_id): Path<String>,
) -> Result<Json<ApproveResponse>, AppError> {
    let conversation_id = state
        .market
        .approve_dm_request(&agent.id, &request_id)
        .await?;
    Ok(Json(ApproveResponse { conversation_id }))
}

/// `POST /v1/dm/requests/{id}/reject`
pub async fn reject(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    Path(request_id): Path<String>,
) -> Result<Json<DmRequest>, AppError> {
    Ok(Json(
        state
            .market
            .reject_dm_request(&agent.id, &request_id)
            .await?,
    ))
}

/// `GET /v1/dm/conversations`
pub async fn list_conversations(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    query: Result<Query<ConversationsQuery>, QueryRejection>,
) -> Result<Json<ConversationsResponse>, AppError> {
    let Query(query) = query?;
    let conversations = state
        .market
        .list_conversations(&agent.id, query.include_archived)
        .await?;
    Ok(Json(ConversationsResponse { conversations }))
}

/// `GET /v1/dm/conversations/{id}/messages`
pub async fn messages(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    Path(conversation_id): Path<String>,
    query: Result<Query<MessagesQuery>, QueryRejection>,
) -> Result<Json<MessagesResponse>, AppError> {
    let Query(query) = query?;
    let messages = state
        .market
        .get_messages(&agent.id, &conversation_id, &query)
        .await?;
    Ok(Json(MessagesResponse {
        conversation_id,
        messages,
    }))
}

/// `POST /v1/dm/conversations/{id}/messages` — 201 with the stored message.
pub async fn send_message(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    Path(conversation_id): Path<String>,
    req: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = req?;
    let message = state
        .market
        .send_message(&agent.id, &conversation_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `POST /v1/dm/conversations/{id}/read`
pub async fn mark_read(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    Path(conversation_id): Path<String>,
) -> Result<Json<CountResponse>, AppError> {
    let count = state
        .market
        .mark_messages_read(&agent.id, &conversation_id)
        .await?;
    Ok(Json(CountResponse { count }))
}

/// `POST /v1/dm/conversations/{id}/archive` — `{"archive": false}` restores.
pub async fn archive(
    State(state): State<AppState>,
    RequireAgent(agent): RequireAgent,
    Path(conversation_id): Path<String>,
    req: Result<Json<ArchiveRequest>, JsonRejection>,
) -> Result<Json<Conversation>, AppError> {
    let Json(req) = req?;
    Ok(Json(
        state
            .market
            .archive_conversation(&agent.id, &conversation_id, req.archive)
            .await?,
    ))
}
