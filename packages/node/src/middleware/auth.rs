//! Bearer-token authentication extractors.
//!
//! Provides two extractors:
//! - [`RequireAgent`]: resolves `Authorization: Bearer <api key>` to an agent;
//!   401 if the key is absent or unknown, 403 if the agent is banned.
//! - [`AdminAuth`]: requires the operator token configured as
//!   `BAZAAR_ADMIN_TOKEN`; the admin API is disabled (403) when it is unset.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use bazaar::Agent;
use sha2::{Digest, Sha256};

use crate::{error::AppError, handlers::AppState, market::MarketError};

/// The token from an `Authorization: Bearer ...` header, if any.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}

// ---------------------------------------------------------------------------
// RequireAgent extractor
// ---------------------------------------------------------------------------

/// Axum extractor for an authenticated, unbanned agent.
pub struct RequireAgent(pub Agent);

impl<S> FromRequestParts<S> for RequireAgent
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let app_state = AppState::from_ref(state);
        let token = bearer_token(&parts.headers).map(str::to_string);
        async move {
            let token = token.ok_or_else(|| {
                AppError::Unauthorized("missing Authorization: Bearer <api key>".into())
            })?;
            let agent = app_state
                .market
                .authenticate(&token)
                .await?
                .ok_or_else(|| AppError::Unauthorized("invalid API key".into()))?;
            if agent.is_banned {
                return Err(MarketError::Banned {
                    reason: agent.ban_reason,
                }
                .into());
            }
            Ok(RequireAgent(agent))
        }
    }
}

// ---------------------------------------------------------------------------
// AdminAuth extractor
// ---------------------------------------------------------------------------

/// Axum extractor for the node operator.
pub struct AdminAuth;

impl<S> FromRequestParts<S> for AdminAuth
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let app_state = AppState::from_ref(state);
        let token = bearer_token(&parts.headers).map(str::to_string);
        async move {
            let Some(expected) = app_state.config.admin_token.as_deref() else {
                return Err(AppError::Forbidden("admin API is disabled on this node".into()));
            };
            let token = token.ok_or_else(|| {
                AppError::Unauthorized("missing Authorization: Bearer <admin token>".into())
            })?;
            // Compare digests so the comparison time does not depend on the token.
            if Sha256::digest(token.as_bytes()) != Sha256::digest(expected.as_bytes()) {
                return Err(AppError::Unauthorized("invalid admin token".into()));
            }
            Ok(AdminAuth)
        }
    }
}

/// Short, stable fingerprint of a bearer token for keying per-client state
/// without keeping the token itself.
pub fn token_fingerprint(token: &str) -> String {
    hex::encode(&Sha256::digest(token.as_bytes())[..8])
}
