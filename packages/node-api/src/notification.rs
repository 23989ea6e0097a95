//! Notification inbox types.

use bazaar::Notification;
use serde::{Deserialize, Serialize};

/// Query parameters for `GET /v1/notifications`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl NotificationsQuery {
    /// Effective limit, clamped to [1, 100]. Returns 50 if not specified.
    pub fn effective_limit(&self) -> usize {
        self.limit.map(|l| l.clamp(1, 100)).unwrap_or(50) as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationsResponse {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

/// Body of `POST /v1/notifications/read`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkNotificationsReadRequest {
    pub notification_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnreadCountResponse {
    pub unread_count: usize,
}
