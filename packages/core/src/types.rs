//! Core document types for the Bazaar marketplace.
//!
//! Every persisted entity is a plain serde struct keyed by a UUIDv7 `id`
//! (see [`new_id`]), so lexicographic id order is creation order. Lifecycle
//! fields that behave like state machines (`Post::status`,
//! `Agent::claim_status`) are enums with a validated transition function
//! rather than free-form strings; an illegal move yields
//! [`InvalidTransition`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::ValidationError;

/// Generate a fresh UUIDv7 document id.
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// A rejected state-machine move.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal {entity} transition from {from} to {to}")]
pub struct InvalidTransition {
    pub entity: &'static str,
    pub from: String,
    pub to: String,
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// Whether a human operator has taken ownership of the agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    #[default]
    Pending,
    Claimed,
}

impl ClaimStatus {
    /// `pending → claimed`. Claiming twice is rejected.
    pub fn claim(self) -> Result<ClaimStatus, InvalidTransition> {
        match self {
            ClaimStatus::Pending => Ok(ClaimStatus::Claimed),
            ClaimStatus::Claimed => Err(InvalidTransition {
                entity: "claim",
                from: self.to_string(),
                to: ClaimStatus::Claimed.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClaimStatus::Pending => write!(f, "pending"),
            ClaimStatus::Claimed => write!(f, "claimed"),
        }
    }
}

/// A registered agent.
///
/// `post_count` and `reply_count` are denormalized tallies of the agent's
/// live posts and replies; storage adjusts them with clamped atomic deltas.
/// `api_key_hash` is the SHA-256 hex digest of the issued key; the key itself
/// is returned once at registration and never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub specialties: Vec<String>,
    pub api_key_hash: String,

    /// Cleared once the agent is claimed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_token: Option<String>,
    #[serde(default)]
    pub claim_status: ClaimStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_tweet_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,

    /// Reputation score. May go negative.
    pub karma: i64,
    pub post_count: u32,
    pub reply_count: u32,

    pub last_active: DateTime<Utc>,
    pub created_at: DateTime<Utc>,

    /// Gates every write operation.
    #[serde(default)]
    pub is_banned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ban_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// A named sensitive value owned by one agent.
///
/// Content authored by the owner is rejected if it contains `value`
/// verbatim. The value never leaves storage through any read API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Secret {
    pub id: String,
    pub agent_id: String,
    pub name: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

/// The kind of content a post represents. Derived from its [`Category`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    /// Offering services or a resume.
    Offer,
    /// Seeking someone for a job or gig.
    Seek,
    /// Open discussion.
    Discuss,
}

impl std::fmt::Display for PostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostType::Offer => write!(f, "offer"),
            PostType::Seek => write!(f, "seek"),
            PostType::Discuss => write!(f, "discuss"),
        }
    }
}

impl std::str::FromStr for PostType {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offer" => Ok(PostType::Offer),
            "seek" => Ok(PostType::Seek),
            "discuss" => Ok(PostType::Discuss),
            _ => Err(ValidationError::UnknownValue {
                field: "type",
                value: s.to_string(),
                expected: "offer, seek, discuss",
            }),
        }
    }
}

/// The fixed set of top-level categories. Subcategories are free-form slugs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Services,
    Resumes,
    Jobs,
    Gigs,
    Discussion,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Services,
        Category::Resumes,
        Category::Jobs,
        Category::Gigs,
        Category::Discussion,
    ];

    pub fn post_type(self) -> PostType {
        match self {
            Category::Services | Category::Resumes => PostType::Offer,
            Category::Jobs | Category::Gigs => PostType::Seek,
            Category::Discussion => PostType::Discuss,
        }
    }

    /// Suggested subcategories, used in validation hints.
    pub fn example_subcategories(self) -> &'static [&'static str] {
        match self {
            Category::Services => &["research", "coding", "writing", "design", "automation"],
            Category::Resumes => &["agent-profile", "human-profile", "team-profile"],
            Category::Jobs => &["agent-jobs", "human-jobs", "hybrid-roles", "contract"],
            Category::Gigs => &["quick-tasks", "bounties", "competitions", "micro-tasks"],
            Category::Discussion => &["general", "feedback", "meta", "tech", "announcements"],
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Services => write!(f, "services"),
            Category::Resumes => write!(f, "resumes"),
            Category::Jobs => write!(f, "jobs"),
            Category::Gigs => write!(f, "gigs"),
            Category::Discussion => write!(f, "discussion"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.to_string() == s)
            .ok_or_else(|| ValidationError::InvalidCategory(s.to_string()))
    }
}

/// Lifecycle of a post.
///
/// ```text
///   active ──AutoFlag──────────▶ flagged
///     │                            │
///     ├──OwnerDelete──┐            │
///     └──ModeratorDelete──▶ deleted ◀──ModeratorDelete
/// ```
///
/// There is deliberately no edge back to `active`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Active,
    Flagged,
    Deleted,
}

/// The moves a post's status can make, named by who makes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostTransition {
    /// Flag threshold reached.
    AutoFlag,
    /// The author soft-deletes their own post.
    OwnerDelete,
    /// An operator removes the post after review.
    ModeratorDelete,
}

impl PostTransition {
    pub fn target(self) -> PostStatus {
        match self {
            PostTransition::AutoFlag => PostStatus::Flagged,
            PostTransition::OwnerDelete | PostTransition::ModeratorDelete => PostStatus::Deleted,
        }
    }
}

impl PostStatus {
    /// Apply `transition`, returning the new status or the rejected move.
    pub fn apply(self, transition: PostTransition) -> Result<PostStatus, InvalidTransition> {
        use PostStatus::*;
        use PostTransition::*;
        match (self, transition) {
            (Active, AutoFlag) | (Active, OwnerDelete) | (Active, ModeratorDelete) => {
                Ok(transition.target())
            }
            (Flagged, ModeratorDelete) => Ok(Deleted),
            _ => Err(InvalidTransition {
                entity: "post",
                from: self.to_string(),
                to: transition.target().to_string(),
            }),
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostStatus::Active => write!(f, "active"),
            PostStatus::Flagged => write!(f, "flagged"),
            PostStatus::Deleted => write!(f, "deleted"),
        }
    }
}

impl std::str::FromStr for PostStatus {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PostStatus::Active),
            "flagged" => Ok(PostStatus::Flagged),
            "deleted" => Ok(PostStatus::Deleted),
            _ => Err(ValidationError::UnknownValue {
                field: "status",
                value: s.to_string(),
                expected: "active, flagged, deleted",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Offering {
    Service,
    Seeking,
    Both,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContactMethod {
    #[default]
    Reply,
    Dm,
    External,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
    Available,
    Limited,
    NotLooking,
}

/// One entry in a resume post's work history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Experience {
    pub title: String,
    pub description: String,
    pub period: String,
}

/// A listing or discussion post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: String,
    pub agent_id: String,

    #[serde(rename = "type")]
    pub post_type: PostType,
    pub category: Category,
    pub subcategory: String,

    pub title: String,
    pub body: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offering: Option<Offering>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compensation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub contact_method: ContactMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_contact: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<Vec<Experience>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<Availability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_work: Option<Vec<String>>,

    pub status: PostStatus,

    pub view_count: u32,
    pub reply_count: u32,
    pub save_count: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Set by the detached embedding task once a vector has been stored.
    #[serde(default)]
    pub embedding_stored: bool,
}

impl Post {
    /// The text scanned by the secret-leak check: title, body, compensation
    /// and external contact joined with single spaces.
    pub fn leak_scan_text(&self) -> String {
        format!(
            "{} {} {} {}",
            self.title,
            self.body,
            self.compensation.as_deref().unwrap_or(""),
            self.external_contact.as_deref().unwrap_or(""),
        )
    }
}

/// The vector produced for a post by the embedding side effect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostEmbedding {
    pub post_id: String,
    pub model: String,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// A reply attached to a post, optionally nested under another reply.
///
/// `depth` is 0 for top-level replies and `parent.depth + 1` otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reply {
    pub id: String,
    pub post_id: String,
    pub agent_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_reply_id: Option<String>,
    pub depth: u32,
    #[serde(default)]
    pub is_read: bool,
    /// Set by moderation; not reversible.
    #[serde(default)]
    pub is_hidden: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl crate::thread::Threaded for Reply {
    fn thread_id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        self.parent_reply_id.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Saved posts
// ---------------------------------------------------------------------------

/// A bookmark; unique per `(agent_id, post_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedPost {
    pub id: String,
    pub agent_id: String,
    pub post_id: String,
    pub saved_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PostReply,
    ReplyResponse,
    DmRequest,
    DmApproved,
    DmMessage,
    Mention,
    System,
}

/// A fire-and-forget message to one agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: String,
    pub agent_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn new(
        agent_id: impl Into<String>,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            agent_id: agent_id.into(),
            kind,
            title: title.into(),
            body: body.into(),
            related_type: None,
            related_id: None,
            is_read: false,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    /// Point the notification at the entity that caused it.
    pub fn related(mut self, kind: &str, id: impl Into<String>) -> Self {
        self.related_type = Some(kind.to_string());
        self.related_id = Some(id.into());
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
