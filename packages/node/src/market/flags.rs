//! Flags, threshold auto-moderation and moderator resolution.

use bazaar::validation::{validate_flag_details, validate_notes};
use bazaar::{new_id, Flag, FlagStatus, FlagTarget, PostTransition, ValidationError};
use bazaar_node_api::{ActionFlagResponse, CreateFlagRequest, CreateFlagResponse, FlagsQuery};
use chrono::Utc;
use tracing::{info, warn};

use super::{MarketError, Marketplace};
use crate::storage::StorageError;

impl Marketplace {
    /// File a flag. When the target is an active post and this flag brings
    /// its count to the threshold, the post moves to `flagged`.
    pub async fn create_flag(
        &self,
        reporter_id: &str,
        req: CreateFlagRequest,
    ) -> Result<CreateFlagResponse, MarketError> {
        self.active_agent(reporter_id).await?;
        self.check_flag_cooldown(reporter_id).await?;

        let existing = self.storage.flags_for_target(&req.target).await?;
        if existing.iter().any(|f| f.reporter_id == reporter_id) {
            return Err(MarketError::DuplicateFlag);
        }
        if let Some(details) = &req.details {
            validate_flag_details(details)?;
        }

        let flag = Flag {
            id: new_id(),
            reporter_id: reporter_id.to_string(),
            target: req.target,
            reason: req.reason,
            details: req.details,
            status: FlagStatus::Pending,
            reviewed_by: None,
            review_notes: None,
            created_at: Utc::now(),
            reviewed_at: None,
        };
        match self.storage.insert_flag(&flag).await {
            Ok(()) => {}
            Err(StorageError::Conflict(_)) => return Err(MarketError::DuplicateFlag),
            Err(e) => return Err(e.into()),
        }

        let auto_flagged = self.auto_moderate(&flag.target).await?;
        Ok(CreateFlagResponse {
            flag_id: flag.id,
            auto_flagged,
        })
    }

    /// Recount flags on `target` and flag the post if it crossed the
    /// threshold. Returns whether this call changed the post.
    async fn auto_moderate(&self, target: &FlagTarget) -> Result<bool, MarketError> {
        let FlagTarget::Post(post_id) = target else {
            return Ok(false);
        };
        let count = self.storage.count_flags_for_target(target).await?;
        if count < self.policy.auto_flag_threshold {
            return Ok(false);
        }
        match self
            .storage
            .transition_post(post_id, PostTransition::AutoFlag)
            .await
        {
            Ok(_) => {
                info!(post_id, flags = count, "post auto-flagged");
                Ok(true)
            }
            // Already flagged or deleted, or the post never existed.
            Err(StorageError::Conflict(_) | StorageError::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_flag(&self, flag_id: &str) -> Result<Flag, MarketError> {
        self.storage
            .get_flag(flag_id)
            .await?
            .ok_or(MarketError::NotFound("flag"))
    }

    /// Record a moderator's review outcome.
    pub async fn review_flag(
        &self,
        flag_id: &str,
        reviewer: &str,
        status: FlagStatus,
        notes: Option<String>,
    ) -> Result<Flag, MarketError> {
        if status == FlagStatus::Pending {
            return Err(ValidationError::UnknownValue {
                field: "status",
                value: status.to_string(),
                expected: "reviewed, actioned, dismissed",
            }
            .into());
        }
        if let Some(notes) = &notes {
            validate_notes(notes)?;
        }

        let mut flag = self.load_flag(flag_id).await?;
        flag.status = flag
            .status
            .review(status)
            .map_err(|_| MarketError::AlreadyResolved("flag"))?;
        flag.reviewed_by = Some(reviewer.to_string());
        flag.review_notes = notes;
        flag.reviewed_at = Some(Utc::now());
        self.storage.update_flag(&flag).await?;
        info!(flag_id, reviewer, status = %flag.status, "flag reviewed");
        Ok(flag)
    }

    /// Apply the target's moderation action and mark the flag actioned.
    /// A target that no longer exists is skipped.
    pub async fn action_flag(
        &self,
        flag_id: &str,
        reviewer: &str,
    ) -> Result<ActionFlagResponse, MarketError> {
        let mut flag = self.load_flag(flag_id).await?;
        if flag.status.is_resolved() {
            return Err(MarketError::AlreadyResolved("flag"));
        }

        let action = flag.target.action();
        let applied = self.apply_action(&flag).await?;
        if !applied {
            warn!(flag_id, target = %flag.target, "moderation target missing, skipped");
        }

        flag.status = FlagStatus::Actioned;
        flag.reviewed_by = Some(reviewer.to_string());
        flag.reviewed_at = Some(Utc::now());
        self.storage.update_flag(&flag).await?;
        info!(flag_id, reviewer, ?action, applied, "flag actioned");

        Ok(ActionFlagResponse {
            flag,
            action,
            applied,
        })
    }

    async fn apply_action(&self, flag: &Flag) -> Result<bool, MarketError> {
        match &flag.target {
            FlagTarget::Post(id) => {
                match self
                    .storage
                    .transition_post(id, PostTransition::ModeratorDelete)
                    .await
                {
                    Ok(_) => Ok(true),
                    Err(StorageError::NotFound | StorageError::Conflict(_)) => Ok(false),
                    Err(e) => Err(e.into()),
                }
            }
            FlagTarget::Reply(id) => Ok(self.storage.hide_reply(id).await?),
            FlagTarget::Agent(id) => {
                let reason = format!("Flagged for: {}", flag.reason);
                match self.storage.set_ban(id, Some(reason)).await {
                    Ok(_) => Ok(true),
                    Err(StorageError::NotFound) => Ok(false),
                    Err(e) => Err(e.into()),
                }
            }
            FlagTarget::Message(id) => Ok(self.storage.hide_message(id).await?),
        }
    }

    pub async fn list_flags(&self, query: &FlagsQuery) -> Result<Vec<Flag>, MarketError> {
        Ok(self
            .storage
            .list_flags(query.status, query.effective_limit())
            .await?)
    }

    pub async fn flags_for_target(&self, target: &FlagTarget) -> Result<Vec<Flag>, MarketError> {
        Ok(self.storage.flags_for_target(target).await?)
    }
}
