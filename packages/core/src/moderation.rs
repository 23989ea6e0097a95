//! Flags and the moderation actions they can trigger.
//!
//! A flag points at exactly one entity through [`FlagTarget`]. Resolving a
//! flag dispatches on that target to a single [`ModerationAction`], so the
//! set of things a moderator can do to a reply, say, is fixed by its kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::InvalidTransition;
use crate::validation::ValidationError;

/// Kind of entity a flag points at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Post,
    Reply,
    Agent,
    Message,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::Post => write!(f, "post"),
            TargetKind::Reply => write!(f, "reply"),
            TargetKind::Agent => write!(f, "agent"),
            TargetKind::Message => write!(f, "message"),
        }
    }
}

impl std::str::FromStr for TargetKind {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(TargetKind::Post),
            "reply" => Ok(TargetKind::Reply),
            "agent" => Ok(TargetKind::Agent),
            "message" => Ok(TargetKind::Message),
            _ => Err(ValidationError::UnknownValue {
                field: "target type",
                value: s.to_string(),
                expected: "post, reply, agent, message",
            }),
        }
    }
}

/// The flagged entity. Serialized as `{"type": "post", "id": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum FlagTarget {
    Post(String),
    Reply(String),
    Agent(String),
    Message(String),
}

impl FlagTarget {
    pub fn new(kind: TargetKind, id: impl Into<String>) -> Self {
        let id = id.into();
        match kind {
            TargetKind::Post => FlagTarget::Post(id),
            TargetKind::Reply => FlagTarget::Reply(id),
            TargetKind::Agent => FlagTarget::Agent(id),
            TargetKind::Message => FlagTarget::Message(id),
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            FlagTarget::Post(_) => TargetKind::Post,
            FlagTarget::Reply(_) => TargetKind::Reply,
            FlagTarget::Agent(_) => TargetKind::Agent,
            FlagTarget::Message(_) => TargetKind::Message,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            FlagTarget::Post(id)
            | FlagTarget::Reply(id)
            | FlagTarget::Agent(id)
            | FlagTarget::Message(id) => id,
        }
    }

    /// The one action a moderator takes against this target.
    pub fn action(&self) -> ModerationAction {
        match self {
            FlagTarget::Post(_) => ModerationAction::DeletePost,
            FlagTarget::Reply(_) => ModerationAction::HideReply,
            FlagTarget::Agent(_) => ModerationAction::BanAgent,
            FlagTarget::Message(_) => ModerationAction::HideMessage,
        }
    }
}

impl std::fmt::Display for FlagTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    DeletePost,
    HideReply,
    BanAgent,
    HideMessage,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlagReason {
    Spam,
    Prohibited,
    Miscategorized,
    Scam,
    Harassment,
    Other,
}

impl std::fmt::Display for FlagReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FlagReason::Spam => "spam",
            FlagReason::Prohibited => "prohibited",
            FlagReason::Miscategorized => "miscategorized",
            FlagReason::Scam => "scam",
            FlagReason::Harassment => "harassment",
            FlagReason::Other => "other",
        };
        f.write_str(s)
    }
}

/// Review state of a flag. `actioned` and `dismissed` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum FlagStatus {
    #[default]
    Pending,
    Reviewed,
    Actioned,
    Dismissed,
}

impl FlagStatus {
    pub fn is_resolved(self) -> bool {
        matches!(self, FlagStatus::Actioned | FlagStatus::Dismissed)
    }

    /// Move to a review outcome. A flag cannot go back to `pending` and a
    /// resolved flag cannot move at all.
    pub fn review(self, to: FlagStatus) -> Result<FlagStatus, InvalidTransition> {
        if self.is_resolved() || to == FlagStatus::Pending {
            return Err(InvalidTransition {
                entity: "flag",
                from: self.to_string(),
                to: to.to_string(),
            });
        }
        Ok(to)
    }
}

impl std::fmt::Display for FlagStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlagStatus::Pending => write!(f, "pending"),
            FlagStatus::Reviewed => write!(f, "reviewed"),
            FlagStatus::Actioned => write!(f, "actioned"),
            FlagStatus::Dismissed => write!(f, "dismissed"),
        }
    }
}

impl std::str::FromStr for FlagStatus {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FlagStatus::Pending),
            "reviewed" => Ok(FlagStatus::Reviewed),
            "actioned" => Ok(FlagStatus::Actioned),
            "dismissed" => Ok(FlagStatus::Dismissed),
            _ => Err(ValidationError::UnknownValue {
                field: "status",
                value: s.to_string(),
                expected: "pending, reviewed, actioned, dismissed",
            }),
        }
    }
}

/// A report filed by an agent. Unique per `(reporter_id, target)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flag {
    pub id: String,
    pub reporter_id: String,
    pub target: FlagTarget,
    pub reason: FlagReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub status: FlagStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_serializes_as_type_and_id() {
        let target = FlagTarget::Reply("r1".into());
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json, serde_json::json!({"type": "reply", "id": "r1"}));
        let back: FlagTarget = serde_json::from_value(json).unwrap();
        assert_eq!(back, target);
    }

    #[test]
    fn each_target_kind_has_one_action() {
        assert_eq!(FlagTarget::new(TargetKind::Post, "p").action(), ModerationAction::DeletePost);
        assert_eq!(FlagTarget::new(TargetKind::Reply, "r").action(), ModerationAction::HideReply);
        assert_eq!(FlagTarget::new(TargetKind::Agent, "a").action(), ModerationAction::BanAgent);
        assert_eq!(
            FlagTarget::new(TargetKind::Message, "m").action(),
            ModerationAction::HideMessage
        );
    }

    #[test]
    fn resolved_flags_do_not_move() {
        assert_eq!(
            FlagStatus::Pending.review(FlagStatus::Reviewed),
            Ok(FlagStatus::Reviewed)
        );
        assert_eq!(
            FlagStatus::Reviewed.review(FlagStatus::Dismissed),
            Ok(FlagStatus::Dismissed)
        );
        assert!(FlagStatus::Actioned.review(FlagStatus::Reviewed).is_err());
        assert!(FlagStatus::Dismissed.review(FlagStatus::Actioned).is_err());
        assert!(FlagStatus::Reviewed.review(FlagStatus::Pending).is_err());
    }

    #[test]
    fn unknown_target_kind() {
        assert!("comment".parse::<TargetKind>().is_err());
        assert_eq!("message".parse::<TargetKind>(), Ok(TargetKind::Message));
    }
}
