//! Assembles the Axum [`Router`] from all handler modules.

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{
    config::NodeConfig,
    handlers::{
        admin, agents, dms, flags, node, notifications, posts, replies, saved, secrets, AppState,
    },
    market::Marketplace,
    middleware::rate_limit::{rate_limit_middleware, RateLimiter},
};

/// Build the complete application router with a fresh per-client limiter.
pub fn build_router(market: Arc<Marketplace>, config: NodeConfig) -> Router {
    let limiter = Arc::new(RateLimiter::new(config.rate_limit_per_minute));
    build_router_with_limiter(market, config, limiter)
}

/// Build the router around a limiter the caller keeps a handle to, so it
/// can be pruned from a background task.
pub fn build_router_with_limiter(
    market: Arc<Marketplace>,
    config: NodeConfig,
    limiter: Arc<RateLimiter>,
) -> Router {
    let state = AppState { market, config };

    Router::new()
        // Node discovery
        .route("/.well-known/bazaar", get(node::well_known))
        // Agents
        .route("/v1/agents/register", post(agents::register))
        .route("/v1/agents/claim", post(agents::claim))
        .route("/v1/agents/me", get(agents::me).patch(agents::update_me))
        .route("/v1/agents/me/verify", post(agents::verify))
        .route("/v1/agents/me/replies", get(agents::my_replies))
        .route("/v1/agents/{id_or_name}", get(agents::get_agent))
        // Secrets
        .route("/v1/secrets", get(secrets::list).post(secrets::add))
        .route("/v1/secrets/{id_or_name}", delete(secrets::remove))
        // Posts
        .route("/v1/posts", get(posts::browse).post(posts::create))
        .route("/v1/posts/search", get(posts::search))
        .route(
            "/v1/posts/{id}",
            get(posts::get_post)
                .patch(posts::update)
                .delete(posts::delete),
        )
        .route(
            "/v1/posts/{id}/replies",
            get(replies::thread).post(replies::create),
        )
        // Replies
        .route("/v1/replies/read", post(replies::mark_read))
        .route(
            "/v1/replies/{id}",
            get(replies::get_reply)
                .patch(replies::update)
                .delete(replies::delete),
        )
        .route("/v1/replies/{id}/respond", post(replies::respond))
        // Direct messages
        .route(
            "/v1/dm/requests",
            get(dms::list_requests).post(dms::send_request),
        )
        .route("/v1/dm/requests/{id}/approve", post(dms::approve))
        .route("/v1/dm/requests/{id}/reject", post(dms::reject))
        .route("/v1/dm/conversations", get(dms::list_conversations))
        .route(
            "/v1/dm/conversations/{id}/messages",
            get(dms::messages).post(dms::send_message),
        )
        .route("/v1/dm/conversations/{id}/read", post(dms::mark_read))
        .route("/v1/dm/conversations/{id}/archive", post(dms::archive))
        // Flags
        .route("/v1/flags", post(flags::create))
        // Saved posts
        .route("/v1/saved", get(saved::list).post(saved::save))
        .route(
            "/v1/saved/{post_id}",
            get(saved::is_saved)
                .patch(saved::update_notes)
                .delete(saved::unsave),
        )
        // Notifications
        .route("/v1/notifications", get(notifications::list))
        .route(
            "/v1/notifications/unread-count",
            get(notifications::unread_count),
        )
        .route("/v1/notifications/read", post(notifications::mark_read))
        .route(
            "/v1/notifications/read-all",
            post(notifications::mark_all_read),
        )
        .route("/v1/notifications/{id}", delete(notifications::delete))
        // Moderation
        .route("/v1/admin/flags", get(admin::list_flags))
        .route(
            "/v1/admin/flags/target/{kind}/{id}",
            get(admin::target_flags),
        )
        .route("/v1/admin/flags/{id}/review", post(admin::review_flag))
        .route("/v1/admin/flags/{id}/action", post(admin::action_flag))
        .route("/v1/admin/agents/{id}/ban", post(admin::ban_agent))
        .route("/v1/admin/agents/{id}/unban", post(admin::unban_agent))
        .route("/v1/admin/agents/{id}/karma", post(admin::adjust_karma))
        .route(
            "/v1/admin/notifications/cleanup",
            post(admin::cleanup_notifications),
        )
        .with_state(state)
        // Rate limiting layer applied after routing so it can see the full request.
        .layer(axum::middleware::from_fn(move |req, next| {
            rate_limit_middleware(Arc::clone(&limiter), req, next)
        }))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    use crate::handlers::test_support::call;
    use crate::storage::memory::MemoryStorage;

    #[tokio::test]
    async fn per_client_limit_returns_429_with_retry_after() {
        let market = Arc::new(Marketplace::with_storage(Arc::new(MemoryStorage::new())));
        let config = NodeConfig {
            rate_limit_per_minute: 2,
            ..NodeConfig::default()
        };
        let app = build_router(market, config);

        for _ in 0..2 {
            let (status, _) = call(&app, "GET", "/v1/posts", None, None).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, body) = call(&app, "GET", "/v1/posts", None, None).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["code"], "rate_limited");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let market = Arc::new(Marketplace::with_storage(Arc::new(MemoryStorage::new())));
        let app = build_router(market, NodeConfig::default());
        let (status, _) = call(&app, "GET", "/v1/units", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
