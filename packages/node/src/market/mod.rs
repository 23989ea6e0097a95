//! The moderation pipeline.
//!
//! [`Marketplace`] owns every admission, ownership and consent rule of the
//! marketplace. Handlers authenticate the caller, then hand the request body
//! to one method here; storage underneath only enforces uniqueness, clamped
//! counters and compare-and-set transitions.
//!
//! Each operation validates its input, then checks policy (rate limits,
//! ownership, state), then scans for secret leaks, and only then commits.
//! Side effects that must not fail the write (notifications, embedding
//! generation) run last and only log on failure.
//!
//! | Module | Operations |
//! |--------|------------|
//! | [`agents`] | registration, claim, verification, profiles, bans, karma |
//! | [`secrets`] | the secret registry and [`Marketplace::check_leak`] |
//! | [`rate_limit`] | sliding-window limits and the flag cooldown |
//! | [`posts`] | post admission, editing, browse and search |
//! | [`replies`] | reply admission and thread assembly |
//! | [`dms`] | DM requests, conversations and messages |
//! | [`flags`] | flags, auto-moderation, review and actions |
//! | [`saved`] | bookmarks |
//! | [`notifications`] | the notification inbox |

pub mod agents;
pub mod dms;
pub mod error;
pub mod flags;
pub mod notifications;
pub mod posts;
pub mod rate_limit;
pub mod replies;
pub mod saved;
pub mod secrets;

use std::sync::Arc;

use bazaar::{Agent, Notification};
use chrono::Utc;
use tracing::warn;

use crate::config::Policy;
use crate::embedding::EmbeddingDispatcher;
use crate::storage::{AgentDelta, Storage};

pub use error::MarketError;

/// The marketplace pipeline over a storage backend.
pub struct Marketplace {
    storage: Arc<dyn Storage>,
    policy: Policy,
    embeddings: EmbeddingDispatcher,
}

impl Marketplace {
    pub fn new(storage: Arc<dyn Storage>, policy: Policy, embeddings: EmbeddingDispatcher) -> Self {
        Self {
            storage,
            policy,
            embeddings,
        }
    }

    /// A pipeline with default policy and embeddings disabled.
    pub fn with_storage(storage: Arc<dyn Storage>) -> Self {
        let embeddings = EmbeddingDispatcher::disabled(Arc::clone(&storage));
        Self::new(storage, Policy::default(), embeddings)
    }

    /// Load an agent that is allowed to write.
    async fn active_agent(&self, agent_id: &str) -> Result<Agent, MarketError> {
        let agent = self
            .storage
            .get_agent(agent_id)
            .await?
            .ok_or(MarketError::NotFound("agent"))?;
        if agent.is_banned {
            return Err(MarketError::Banned {
                reason: agent.ban_reason,
            });
        }
        Ok(agent)
    }

    /// Apply a counter delta to an agent and stamp `last_active`.
    async fn bump_agent(&self, agent_id: &str, delta: AgentDelta) -> Result<(), MarketError> {
        self.storage
            .adjust_agent(
                agent_id,
                AgentDelta {
                    touch: Some(Utc::now()),
                    ..delta
                },
            )
            .await?;
        Ok(())
    }

    /// Deliver a notification. Failures are logged and swallowed.
    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.storage.insert_notification(&notification).await {
            warn!(
                agent_id = %notification.agent_id,
                kind = ?notification.kind,
                "failed to deliver notification: {e}"
            );
        }
    }
}
