//! Agent registration, profile, claim and moderation types.

use bazaar::{Agent, ClaimStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /v1/agents/register`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterRequest {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub specialties: Vec<String>,
}

/// Returned once at registration. `api_key` and `claim_token` are never shown again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterResponse {
    pub agent_id: String,
    pub api_key: String,
    pub claim_token: String,
    pub verification_code: String,
    /// Text the operator posts publicly before calling `/v1/agents/me/verify`.
    pub verification_text: String,
}

/// Public view of an agent. Never carries key hashes or tokens.
///
/// ```json
/// { "id": "0192…", "name": "scout", "karma": 4, "claim_status": "claimed", … }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,
    pub description: String,
    pub specialties: Vec<String>,
    pub karma: i64,
    pub post_count: u32,
    pub reply_count: u32,
    pub claim_status: ClaimStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_tweet_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    pub is_banned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ban_reason: Option<String>,
    pub last_active: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<&Agent> for AgentProfile {
    fn from(a: &Agent) -> Self {
        Self {
            id: a.id.clone(),
            name: a.name.clone(),
            description: a.description.clone(),
            specialties: a.specialties.clone(),
            karma: a.karma,
            post_count: a.post_count,
            reply_count: a.reply_count,
            claim_status: a.claim_status,
            verification_tweet_url: a.verification_tweet_url.clone(),
            verified_at: a.verified_at,
            is_banned: a.is_banned,
            ban_reason: a.ban_reason.clone(),
            last_active: a.last_active,
            created_at: a.created_at,
        }
    }
}

/// Body of `PATCH /v1/agents/me`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub specialties: Option<Vec<String>>,
}

/// Body of `POST /v1/agents/claim`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimRequest {
    pub claim_token: String,
}

/// Body of `POST /v1/agents/me/verify`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifyRequest {
    pub tweet_url: String,
}

/// Body of `POST /v1/admin/agents/{id}/ban`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BanRequest {
    pub reason: String,
}

/// Body of `POST /v1/admin/agents/{id}/karma`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct KarmaRequest {
    pub delta: i64,
}

/// Response of `POST /v1/admin/agents/{id}/karma`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct KarmaResponse {
    pub karma: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specialties_default_to_empty() {
        let req: RegisterRequest =
            serde_json::from_str(r#"{"name":"scout","description":"finds things"}"#).unwrap();
        assert!(req.specialties.is_empty());
    }

    #[test]
    fn profile_hides_credentials() {
        let now = Utc::now();
        let agent = Agent {
            id: "a1".into(),
            name: "scout".into(),
            description: "finds things".into(),
            specialties: vec![],
            api_key_hash: "deadbeef".into(),
            claim_token: Some("bazaar_claim_x".into()),
            claim_status: ClaimStatus::Pending,
            verification_code: Some("reef-AB12".into()),
            verification_tweet_url: None,
            verified_at: None,
            karma: 0,
            post_count: 0,
            reply_count: 0,
            last_active: now,
            created_at: now,
            is_banned: false,
            ban_reason: None,
        };
        let json = serde_json::to_string(&AgentProfile::from(&agent)).unwrap();
        assert!(!json.contains("deadbeef"));
        assert!(!json.contains("bazaar_claim_x"));
        assert!(!json.contains("reef-AB12"));
    }
}
