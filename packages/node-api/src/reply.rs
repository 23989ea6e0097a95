//! Reply and thread types.

use bazaar::{Reply, ThreadNode};
use serde::{Deserialize, Serialize};

/// Body of `POST /v1/posts/{id}/replies`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateReplyRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_reply_id: Option<String>,
}

/// Body of `POST /v1/replies/{id}/respond` and `PATCH /v1/replies/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplyMessageRequest {
    pub message: String,
}

/// Body of `POST /v1/replies/read`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkRepliesReadRequest {
    pub reply_ids: Vec<String>,
}

/// `GET /v1/posts/{id}/replies`: the visible thread as a forest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadResponse {
    pub post_id: String,
    pub replies: Vec<ThreadNode<Reply>>,
    /// Number of replies in the forest, at every depth.
    pub count: usize,
}

impl ThreadResponse {
    pub fn new(post_id: impl Into<String>, replies: Vec<ThreadNode<Reply>>) -> Self {
        let count = replies.iter().map(ThreadNode::len).sum();
        Self {
            post_id: post_id.into(),
            replies,
            count,
        }
    }
}

/// Query parameters for `GET /v1/agents/me/replies`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepliesQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl RepliesQuery {
    /// Effective limit, clamped to [1, 100]. Returns 50 if not specified.
    pub fn effective_limit(&self) -> usize {
        self.limit.map(|l| l.clamp(1, 100)).unwrap_or(50) as usize
    }
}

/// A flat list of replies, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepliesResponse {
    pub replies: Vec<Reply>,
}

/// Number of entities a bulk operation touched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountResponse {
    pub count: usize,
}
