//! Per-agent action limits.
//!
//! Limits count the actor's own stored entities inside a trailing window, so
//! there is no counter state to keep in sync. The check runs before the
//! insert and is not fenced: two concurrent writes at the boundary can both
//! pass.

use chrono::{Duration, Utc};

use super::{MarketError, Marketplace};

/// The trailing window for daily limits.
pub fn day() -> Duration {
    Duration::hours(24)
}

impl Marketplace {
    /// At most `policy.posts_per_day` posts in any trailing 24 hours.
    pub(crate) async fn check_post_limit(&self, agent_id: &str) -> Result<(), MarketError> {
        let since = Utc::now() - day();
        let count = self.storage.count_posts_since(agent_id, since).await?;
        if count >= self.policy.posts_per_day {
            return Err(MarketError::RateLimited {
                hint: format!(
                    "You can create {} posts per 24 hours. Try again later.",
                    self.policy.posts_per_day
                ),
            });
        }
        Ok(())
    }

    /// At most `policy.dm_requests_per_day` DM requests in any trailing 24 hours.
    pub(crate) async fn check_dm_request_limit(&self, agent_id: &str) -> Result<(), MarketError> {
        let since = Utc::now() - day();
        let count = self.storage.count_dm_requests_since(agent_id, since).await?;
        if count >= self.policy.dm_requests_per_day {
            return Err(MarketError::RateLimited {
                hint: format!(
                    "You can send {} DM requests per 24 hours. Try again later.",
                    self.policy.dm_requests_per_day
                ),
            });
        }
        Ok(())
    }

    /// One flag per `policy.flag_cooldown`, whatever the target.
    pub(crate) async fn check_flag_cooldown(&self, reporter_id: &str) -> Result<(), MarketError> {
        let since = Utc::now() - self.policy.flag_cooldown;
        let count = self
            .storage
            .count_flags_by_reporter_since(reporter_id, since)
            .await?;
        if count > 0 {
            return Err(MarketError::RateLimited {
                hint: format!(
                    "You can flag once every {} seconds",
                    self.policy.flag_cooldown.num_seconds()
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::test_support::{agent, market, post, post_request};
    use crate::storage::test_fixtures;

    #[tokio::test]
    async fn eleventh_post_in_a_day_is_refused() {
        let m = market();
        let id = agent(&m, "scout").await;
        for _ in 0..10 {
            post(&m, &id).await;
        }
        let err = m
            .create_post(&id, post_request("One more", "Over the limit"))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn limits_are_per_agent() {
        let m = market();
        let a = agent(&m, "scout").await;
        let b = agent(&m, "broker").await;
        for _ in 0..10 {
            post(&m, &a).await;
        }
        post(&m, &b).await;
    }

    #[tokio::test]
    async fn deleted_posts_still_count() {
        let m = market();
        let id = agent(&m, "scout").await;
        let mut last = String::new();
        for _ in 0..10 {
            last = post(&m, &id).await;
        }
        m.delete_post(&id, &last).await.unwrap();
        assert!(m.check_post_limit(&id).await.is_err());
    }

    #[tokio::test]
    async fn old_posts_fall_out_of_the_window() {
        let m = market();
        let id = agent(&m, "scout").await;
        for _ in 0..10 {
            let mut p = test_fixtures::post(&id);
            p.created_at = Utc::now() - Duration::hours(25);
            m.storage.insert_post(&p).await.unwrap();
        }
        assert!(m.check_post_limit(&id).await.is_ok());
    }
}
