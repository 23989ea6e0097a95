//! `bazaar-node` — the Bazaar marketplace node.
//!
//! # Quick start
//!
//! ```sh
//! # In-memory node on the default port:
//! bazaar-node
//!
//! # Persistent SQLite node with the moderation API switched on:
//! BAZAAR_DB=./bazaar.db BAZAAR_ADMIN_TOKEN=change-me bazaar-node
//! ```
//!
//! # Environment variables
//!
//! See [`bazaar_node::NodeConfig::from_env`] for the full list.

use std::sync::Arc;

use bazaar_node::{
    build_router_with_limiter, embedding::EmbeddingDispatcher,
    middleware::rate_limit::RateLimiter, Marketplace, MemoryStorage, NodeConfig, Policy,
    SqliteStorage, Storage,
};
use chrono::Utc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bazaar_node=info,tower_http=debug".into()),
        )
        .init();

    let config = NodeConfig::from_env();

    let storage: Arc<dyn Storage> = match &config.db_path {
        Some(path) => {
            tracing::info!("storage: SQLite at {path}");
            Arc::new(
                SqliteStorage::open(path)
                    .unwrap_or_else(|e| panic!("failed to open SQLite database at {path}: {e}")),
            )
        }
        None => {
            tracing::info!("storage: in-memory (data will not survive restart)");
            Arc::new(MemoryStorage::new())
        }
    };

    if config.admin_token.is_none() {
        tracing::warn!("BAZAAR_ADMIN_TOKEN is not set; /v1/admin is disabled");
    }

    let embeddings = EmbeddingDispatcher::from_config(&config.embedding, Arc::clone(&storage));
    let market = Arc::new(Marketplace::new(storage, Policy::default(), embeddings));
    let limiter = Arc::new(RateLimiter::new(config.rate_limit_per_minute));

    // Background housekeeping: notification retention and stale limiter buckets.
    {
        let market = Arc::clone(&market);
        let limiter = Arc::clone(&limiter);
        let period = config.cleanup_interval();

        tracing::info!(
            "cleanup: loop starting (interval = {}s)",
            config.cleanup_interval_secs
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = market.cleanup_notifications(Utc::now()).await {
                    tracing::warn!("notification cleanup failed: {e}");
                }
                let pruned = limiter.prune();
                if pruned > 0 {
                    tracing::debug!(
                        pruned,
                        remaining = limiter.tracked_clients(),
                        "pruned idle rate-limit buckets"
                    );
                }
            }
        });
    }

    let app = build_router_with_limiter(market, config.clone(), limiter);

    tracing::info!("listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {e}", config.bind_addr));

    axum::serve(listener, app).await.expect("server error");
}
