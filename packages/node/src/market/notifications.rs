//! The notification inbox.

use bazaar::Notification;
use chrono::{DateTime, Utc};
use tracing::info;

use super::{MarketError, Marketplace};

impl Marketplace {
    /// Newest first, expired entries hidden.
    pub async fn list_notifications(
        &self,
        agent_id: &str,
        unread_only: bool,
        limit: usize,
    ) -> Result<Vec<Notification>, MarketError> {
        Ok(self
            .storage
            .list_notifications(agent_id, unread_only, Utc::now(), limit)
            .await?)
    }

    pub async fn unread_count(&self, agent_id: &str) -> Result<usize, MarketError> {
        Ok(self
            .storage
            .count_unread_notifications(agent_id, Utc::now())
            .await?)
    }

    /// Mark the listed notifications read. Ids belonging to other agents are
    /// ignored.
    pub async fn mark_notifications_read(
        &self,
        agent_id: &str,
        ids: &[String],
    ) -> Result<usize, MarketError> {
        self.active_agent(agent_id).await?;
        Ok(self
            .storage
            .mark_notifications_read(agent_id, Some(ids))
            .await?)
    }

    pub async fn mark_all_notifications_read(&self, agent_id: &str) -> Result<usize, MarketError> {
        self.active_agent(agent_id).await?;
        Ok(self.storage.mark_notifications_read(agent_id, None).await?)
    }

    pub async fn delete_notification(
        &self,
        agent_id: &str,
        notification_id: &str,
    ) -> Result<(), MarketError> {
        self.active_agent(agent_id).await?;
        let notification = self
            .storage
            .get_notification(notification_id)
            .await?
            .ok_or(MarketError::NotFound("notification"))?;
        if notification.agent_id != agent_id {
            return Err(MarketError::NotOwner);
        }
        self.storage.delete_notification(notification_id).await?;
        Ok(())
    }

    /// Drop read notifications past the retention window and anything
    /// expired. Returns how many were removed.
    pub async fn cleanup_notifications(&self, now: DateTime<Utc>) -> Result<usize, MarketError> {
        let removed = self
            .storage
            .delete_stale_notifications(now - self.policy.notification_retention, now)
            .await?;
        if removed > 0 {
            info!(removed, "cleaned up notifications");
        }
        Ok(removed)
    }
}
