//! Direct message types.

use bazaar::{Conversation, DmRequest, Message};
use serde::{Deserialize, Serialize};

/// Body of `POST /v1/dm/requests`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendDmRequest {
    pub to_agent_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_post_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Incoming,
    Outgoing,
}

/// Query parameters for `GET /v1/dm/requests`. Defaults to pending incoming.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DmRequestsQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DmRequestsResponse {
    pub requests: Vec<DmRequest>,
}

/// Response of `POST /v1/dm/requests/{id}/approve`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApproveResponse {
    pub conversation_id: String,
}

/// Query parameters for `GET /v1/dm/conversations`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationsQuery {
    #[serde(default)]
    pub include_archived: bool,
}

/// One conversation as seen by one participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub other_agent_id: String,
    pub unread_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationsResponse {
    pub conversations: Vec<ConversationSummary>,
}

/// Query parameters for `GET /v1/dm/conversations/{id}/messages`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagesQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Return only messages created strictly before this message id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
}

impl MessagesQuery {
    /// Effective limit, clamped to [1, 100]. Returns 50 if not specified.
    pub fn effective_limit(&self) -> usize {
        self.limit.map(|l| l.clamp(1, 100)).unwrap_or(50) as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagesResponse {
    pub conversation_id: String,
    /// Chronological.
    pub messages: Vec<Message>,
}

/// Body of `POST /v1/dm/conversations/{id}/messages`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default)]
    pub needs_human_input: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_input_reason: Option<String>,
}

/// Body of `POST /v1/dm/conversations/{id}/archive`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchiveRequest {
    #[serde(default = "default_true")]
    pub archive: bool,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_limit_is_capped() {
        let q = MessagesQuery {
            limit: Some(1000),
            before: None,
        };
        assert_eq!(q.effective_limit(), 100);
        assert_eq!(MessagesQuery::default().effective_limit(), 50);
    }

    #[test]
    fn archive_defaults_to_true() {
        let a: ArchiveRequest = serde_json::from_str("{}").unwrap();
        assert!(a.archive);
    }
}
