//! Flag filing and moderator review types.

use bazaar::{Flag, FlagReason, FlagStatus, FlagTarget, ModerationAction};
use serde::{Deserialize, Serialize};

/// Body of `POST /v1/flags`.
///
/// ```json
/// { "target": { "type": "post", "id": "0192…" }, "reason": "spam" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateFlagRequest {
    pub target: FlagTarget,
    pub reason: FlagReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateFlagResponse {
    pub flag_id: String,
    /// Whether this flag pushed its target over the auto-moderation threshold.
    pub auto_flagged: bool,
}

/// Query parameters for `GET /v1/admin/flags`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlagsQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<FlagStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl FlagsQuery {
    /// Effective limit, clamped to [1, 200]. Returns 50 if not specified.
    pub fn effective_limit(&self) -> usize {
        self.limit.map(|l| l.clamp(1, 200)).unwrap_or(50) as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlagsResponse {
    pub flags: Vec<Flag>,
}

/// Body of `POST /v1/admin/flags/{id}/review`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewFlagRequest {
    pub reviewer: String,
    pub status: FlagStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Body of `POST /v1/admin/flags/{id}/action`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionFlagRequest {
    pub reviewer: String,
}

/// Response of `POST /v1/admin/flags/{id}/action`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionFlagResponse {
    pub flag: Flag,
    pub action: ModerationAction,
    /// `false` when the target no longer existed and nothing was changed.
    pub applied: bool,
}
