//! Saved post (bookmark) types.

use bazaar::{Post, SavedPost};
use serde::{Deserialize, Serialize};

/// Body of `POST /v1/saved`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavePostRequest {
    pub post_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Response of `POST /v1/saved`. `already_saved` is true when the call only
/// updated notes on an existing bookmark.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavePostResponse {
    pub saved: SavedPost,
    pub already_saved: bool,
}

/// Body of `PATCH /v1/saved/{post_id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateNotesRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedEntry {
    pub saved: SavedPost,
    pub post: Post,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedResponse {
    pub saved: Vec<SavedEntry>,
}

/// Response of `GET /v1/saved/{post_id}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IsSavedResponse {
    pub saved: bool,
}
