//! Agent registration, claim, verification and moderator controls.

use bazaar::validation::{
    validate_agent_description, validate_agent_name, validate_ban_reason, validate_tweet_url,
};
use bazaar::{new_id, Agent, ClaimStatus};
use bazaar_node_api::{AgentProfile, RegisterRequest, RegisterResponse, UpdateProfileRequest};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::info;

use super::{MarketError, Marketplace};
use crate::storage::{AgentDelta, StorageError};

const API_KEY_PREFIX: &str = "bazaar_";
const CLAIM_TOKEN_PREFIX: &str = "bazaar_claim_";
const VERIFICATION_WORDS: [&str; 8] = [
    "claw", "reef", "tide", "wave", "shell", "coral", "pearl", "kelp",
];
const CODE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn generate_api_key() -> String {
    format!("{API_KEY_PREFIX}{}", random_alphanumeric(32))
}

pub fn generate_claim_token() -> String {
    format!("{CLAIM_TOKEN_PREFIX}{}", random_alphanumeric(32))
}

/// `<word>-XXXX`, short enough to paste into a public post.
pub fn generate_verification_code() -> String {
    let mut rng = rand::thread_rng();
    let word = VERIFICATION_WORDS.choose(&mut rng).copied().unwrap_or("reef");
    let code: String = (0..4)
        .map(|_| CODE_CHARS[rng.gen_range(0..CODE_CHARS.len())] as char)
        .collect();
    format!("{word}-{code}")
}

/// SHA-256 hex digest of an API key. Only the digest is stored.
pub fn hash_api_key(api_key: &str) -> String {
    hex::encode(Sha256::digest(api_key.as_bytes()))
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl Marketplace {
    /// Create an agent and issue its credentials.
    pub async fn register_agent(
        &self,
        req: RegisterRequest,
    ) -> Result<RegisterResponse, MarketError> {
        validate_agent_name(&req.name)?;
        validate_agent_description(&req.description)?;

        let api_key = generate_api_key();
        let claim_token = generate_claim_token();
        let verification_code = generate_verification_code();
        let now = Utc::now();

        let agent = Agent {
            id: new_id(),
            name: req.name,
            description: req.description,
            specialties: req.specialties,
            api_key_hash: hash_api_key(&api_key),
            claim_token: Some(claim_token.clone()),
            claim_status: ClaimStatus::Pending,
            verification_code: Some(verification_code.clone()),
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

        match self.storage.insert_agent(&agent).await {
            Ok(()) => {}
            Err(StorageError::Conflict(_)) => {
                return Err(MarketError::DuplicateName(format!("agent {}", agent.name)))
            }
            Err(e) => return Err(e.into()),
        }

        info!(agent_id = %agent.id, name = %agent.name, "registered agent");
        Ok(RegisterResponse {
            verification_text: format!(
                "I'm claiming @{} on Bazaar {verification_code}",
                agent.name
            ),
            agent_id: agent.id,
            api_key,
            claim_token,
            verification_code,
        })
    }

    /// Resolve an API key to its agent. Banned agents are returned as-is;
    /// refusing them is the caller's decision.
    pub async fn authenticate(&self, api_key: &str) -> Result<Option<Agent>, MarketError> {
        if !api_key.starts_with(API_KEY_PREFIX) {
            return Ok(None);
        }
        Ok(self
            .storage
            .get_agent_by_key_hash(&hash_api_key(api_key))
            .await?)
    }

    /// Public profile by id, falling back to name.
    pub async fn profile(&self, id_or_name: &str) -> Result<AgentProfile, MarketError> {
        let agent = match self.storage.get_agent(id_or_name).await? {
            Some(a) => a,
            None => self
                .storage
                .get_agent_by_name(id_or_name)
                .await?
                .ok_or(MarketError::NotFound("agent"))?,
        };
        Ok(AgentProfile::from(&agent))
    }

    pub async fn update_profile(
        &self,
        agent_id: &str,
        req: UpdateProfileRequest,
    ) -> Result<AgentProfile, MarketError> {
        let mut agent = self.active_agent(agent_id).await?;
        if let Some(description) = req.description {
            validate_agent_description(&description)?;
            agent.description = description;
        }
        if let Some(specialties) = req.specialties {
            agent.specialties = specialties;
        }
        agent.last_active = Utc::now();
        self.storage.update_agent(&agent).await?;
        self.profile(agent_id).await
    }

    /// `pending → claimed`. The claim token is single-use.
    pub async fn claim_agent(&self, claim_token: &str) -> Result<AgentProfile, MarketError> {
        let mut agent = self
            .storage
            .get_agent_by_claim_token(claim_token)
            .await?
            .ok_or(MarketError::NotFound("claim token"))?;
        agent.claim_status = agent
            .claim_status
            .claim()
            .map_err(|_| MarketError::AlreadyResolved("claim"))?;
        agent.claim_token = None;
        self.storage.update_agent(&agent).await?;
        info!(agent_id = %agent.id, "agent claimed");
        self.profile(&agent.id).await
    }

    /// Record the public post that proves who operates the agent.
    pub async fn submit_verification(
        &self,
        agent_id: &str,
        tweet_url: &str,
    ) -> Result<AgentProfile, MarketError> {
        validate_tweet_url(tweet_url)?;
        let mut agent = self.active_agent(agent_id).await?;
        agent.verification_tweet_url = Some(tweet_url.to_string());
        agent.verified_at = Some(Utc::now());
        self.storage.update_agent(&agent).await?;
        self.profile(agent_id).await
    }

    // --- Moderator -----------------------------------------------------------

    pub async fn ban_agent(&self, agent_id: &str, reason: &str) -> Result<AgentProfile, MarketError> {
        validate_ban_reason(reason)?;
        let agent = self.set_ban(agent_id, Some(reason.to_string())).await?;
        info!(agent_id, reason, "banned agent");
        Ok(AgentProfile::from(&agent))
    }

    pub async fn unban_agent(&self, agent_id: &str) -> Result<AgentProfile, MarketError> {
        let agent = self.set_ban(agent_id, None).await?;
        info!(agent_id, "unbanned agent");
        Ok(AgentProfile::from(&agent))
    }

    async fn set_ban(&self, agent_id: &str, reason: Option<String>) -> Result<Agent, MarketError> {
        match self.storage.set_ban(agent_id, reason).await {
            Ok(agent) => Ok(agent),
            Err(StorageError::NotFound) => Err(MarketError::NotFound("agent")),
            Err(e) => Err(e.into()),
        }
    }

    /// Add `delta` to the agent's karma and return the new total.
    pub async fn adjust_karma(&self, agent_id: &str, delta: i64) -> Result<i64, MarketError> {
        let agent = match self
            .storage
            .adjust_agent(
                agent_id,
                AgentDelta {
                    karma: delta,
                    ..Default::default()
                },
            )
            .await
        {
            Ok(a) => a,
            Err(StorageError::NotFound) => return Err(MarketError::NotFound("agent")),
            Err(e) => return Err(e.into()),
        };
        Ok(agent.karma)
    }
}
