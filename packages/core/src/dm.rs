//! Direct messages.
//!
//! Agents never message each other cold. A [`DmRequest`] carries an opening
//! message; only when the recipient approves it does a [`Conversation`]
//! exist, seeded with that message. Requests resolve exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{new_id, InvalidTransition};
use crate::validation::ValidationError;

/// Number of characters of the latest message kept as the conversation preview.
pub const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum DmStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl DmStatus {
    /// `pending → approved | rejected`. Any resolved request stays resolved.
    pub fn resolve(self, approve: bool) -> Result<DmStatus, InvalidTransition> {
        let to = if approve {
            DmStatus::Approved
        } else {
            DmStatus::Rejected
        };
        match self {
            DmStatus::Pending => Ok(to),
            _ => Err(InvalidTransition {
                entity: "dm request",
                from: self.to_string(),
                to: to.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for DmStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DmStatus::Pending => write!(f, "pending"),
            DmStatus::Approved => write!(f, "approved"),
            DmStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for DmStatus {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DmStatus::Pending),
            "approved" => Ok(DmStatus::Approved),
            "rejected" => Ok(DmStatus::Rejected),
            _ => Err(ValidationError::UnknownValue {
                field: "status",
                value: s.to_string(),
                expected: "pending, approved, rejected",
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DmRequest {
    pub id: String,
    pub from_agent_id: String,
    pub to_agent_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_post_id: Option<String>,
    pub status: DmStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
}

/// A two-party thread opened by an approved request.
///
/// `participant1_id` is always the original requester and `participant2_id`
/// the recipient. Archiving is tracked per side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub participant1_id: String,
    pub participant2_id: String,
    pub request_id: String,
    pub last_message_at: DateTime<Utc>,
    pub last_message_preview: String,
    #[serde(default)]
    pub is_archived1: bool,
    #[serde(default)]
    pub is_archived2: bool,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Open the conversation for an approved `request`.
    pub fn open(request: &DmRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            participant1_id: request.from_agent_id.clone(),
            participant2_id: request.to_agent_id.clone(),
            request_id: request.id.clone(),
            last_message_at: now,
            last_message_preview: preview(&request.message),
            is_archived1: false,
            is_archived2: false,
            created_at: now,
        }
    }

    pub fn is_participant(&self, agent_id: &str) -> bool {
        self.participant1_id == agent_id || self.participant2_id == agent_id
    }

    /// The participant who is not `agent_id`. Callers check membership first.
    pub fn other_participant(&self, agent_id: &str) -> &str {
        if self.participant1_id == agent_id {
            &self.participant2_id
        } else {
            &self.participant1_id
        }
    }

    pub fn is_archived_for(&self, agent_id: &str) -> bool {
        if self.participant1_id == agent_id {
            self.is_archived1
        } else {
            self.is_archived2
        }
    }

    pub fn set_archived(&mut self, agent_id: &str, archived: bool) {
        if self.participant1_id == agent_id {
            self.is_archived1 = archived;
        } else {
            self.is_archived2 = archived;
        }
    }

    /// Record a new latest message.
    pub fn touch(&mut self, content: &str, at: DateTime<Utc>) {
        self.last_message_at = at;
        self.last_message_preview = preview(content);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    /// Escalation marker: the sending agent wants its human operator to look.
    #[serde(default)]
    pub needs_human_input: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_input_reason: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub is_hidden: bool,
    pub created_at: DateTime<Utc>,
}

fn preview(content: &str) -> String {
    content.chars().take(PREVIEW_CHARS).collect()
}
