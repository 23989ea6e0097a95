//! Application-level error type returned by handlers.
//!
//! Every variant serialises to [`ErrorResponse`] and maps to one HTTP status.
//! Pipeline errors keep their hint so callers learn how to fix the request.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bazaar_node_api::error::codes;
use bazaar_node_api::ErrorResponse;
use tracing::error;

use crate::market::MarketError;
use crate::storage::StorageError;

/// An error that a handler can return; converts directly to an HTTP response.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Market(MarketError),
}

impl AppError {
    fn parts(self) -> (StatusCode, &'static str, String, Option<String>) {
        match self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, codes::INVALID_PARAMETER, msg, None)
            }
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, codes::UNAUTHORIZED, msg, None)
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, codes::FORBIDDEN, msg, None),
            AppError::Market(e) => {
                let hint = e.hint();
                let (status, code) = market_status(&e);
                let msg = match &e {
                    // Storage details stay in the log.
                    MarketError::Storage(inner) => {
                        error!("storage failure: {inner}");
                        "internal error".to_string()
                    }
                    other => other.to_string(),
                };
                (status, code, msg, hint)
            }
        }
    }
}

fn market_status(e: &MarketError) -> (StatusCode, &'static str) {
    use MarketError::*;
    match e {
        Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, codes::VALIDATION_FAILED),
        SecretLeak { .. } => (StatusCode::UNPROCESSABLE_ENTITY, codes::SECRET_LEAK),
        LimitExceeded(_) => (StatusCode::UNPROCESSABLE_ENTITY, codes::LIMIT_EXCEEDED),
        RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, codes::RATE_LIMITED),
        NotFound(_) => (StatusCode::NOT_FOUND, codes::NOT_FOUND),
        ParentNotFound => (StatusCode::NOT_FOUND, codes::PARENT_NOT_FOUND),
        NotOwner => (StatusCode::FORBIDDEN, codes::NOT_OWNER),
        NotAuthorized => (StatusCode::FORBIDDEN, codes::NOT_AUTHORIZED),
        Banned { .. } => (StatusCode::FORBIDDEN, codes::BANNED),
        InvalidState(_) => (StatusCode::CONFLICT, codes::INVALID_STATE),
        AlreadyResolved(_) => (StatusCode::CONFLICT, codes::ALREADY_RESOLVED),
        DuplicateName(_) => (StatusCode::CONFLICT, codes::DUPLICATE_NAME),
        DuplicateFlag => (StatusCode::CONFLICT, codes::DUPLICATE_FLAG),
        AlreadyPending => (StatusCode::CONFLICT, codes::ALREADY_PENDING),
        ConversationExists => (StatusCode::CONFLICT, codes::CONVERSATION_EXISTS),
        MaxDepthExceeded { .. } => (StatusCode::CONFLICT, codes::MAX_DEPTH_EXCEEDED),
        Storage(StorageError::NotFound) => (StatusCode::NOT_FOUND, codes::NOT_FOUND),
        Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, codes::INTERNAL_ERROR),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, hint) = self.parts();
        let body = ErrorResponse::new(code, message).with_hint(hint);
        (status, Json(body)).into_response()
    }
}

impl From<MarketError> for AppError {
    fn from(e: MarketError) -> Self {
        AppError::Market(e)
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        AppError::Market(MarketError::Storage(e))
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar::ValidationError;

    fn status_and_code(e: AppError) -> (StatusCode, &'static str) {
        let (status, code, _, _) = e.parts();
        (status, code)
    }

    #[test]
    fn pipeline_errors_map_to_documented_statuses() {
        let cases = [
            (
                MarketError::from(ValidationError::SelfTarget),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                MarketError::RateLimited { hint: "later".into() },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (MarketError::ParentNotFound, StatusCode::NOT_FOUND),
            (MarketError::Banned { reason: None }, StatusCode::FORBIDDEN),
            (MarketError::AlreadyPending, StatusCode::CONFLICT),
            (MarketError::MaxDepthExceeded { max: 5 }, StatusCode::CONFLICT),
            (
                MarketError::Storage(StorageError::Internal("disk".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(status_and_code(err.into()).0, expected);
        }
    }

    #[test]
    fn secret_leak_keeps_its_hint() {
        let e = AppError::from(MarketError::SecretLeak { name: "k1".into() });
        let (status, code, _, hint) = e.parts();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "secret_leak");
        assert!(hint.unwrap().contains("k1"));
    }

    #[test]
    fn storage_details_are_not_leaked() {
        let e = AppError::from(StorageError::Internal("database is locked".into()));
        let (_, _, msg, _) = e.parts();
        assert_eq!(msg, "internal error");
    }
}
