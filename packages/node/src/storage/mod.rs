//! Storage abstraction layer for the Bazaar node.
//!
//! The [`Storage`] trait defines the contract between the moderation pipeline
//! and persistence. All admission, ownership and consent rules live in
//! [`crate::market`]; storage is a document store with a handful of
//! primitives the pipeline cannot express safely on its own:
//!
//! - **Uniqueness on insert.** Agent names, secret names per agent, one flag
//!   per reporter and target, and one bookmark per agent and post are
//!   rejected with [`StorageError::Conflict`] by the insert itself.
//! - **Clamped counter deltas.** [`Storage::adjust_agent`] and
//!   [`Storage::adjust_post_counter`] apply a signed delta atomically and
//!   never go below zero.
//! - **Compare-and-set transitions.** [`Storage::transition_post`] and
//!   [`Storage::resolve_dm_request`] only succeed from a legal source state.
//!
//! Whole-document updates (`update_post`, `update_agent`, `update_reply`)
//! keep the stored counters and moderation state, so they cannot clobber a
//! concurrent delta, ban or hide. Moderation has its own primitives
//! ([`Storage::set_ban`], [`Storage::hide_reply`], [`Storage::hide_message`]).
//!
//! # Implementations
//!
//! | Type | When to use |
//! |------|-------------|
//! | [`MemoryStorage`] | Tests, conformance suite, ephemeral nodes |
//! | [`SqliteStorage`] | Production; durable single-file database |
//!
//! [`MemoryStorage`]: memory::MemoryStorage
//! [`SqliteStorage`]: sqlite::SqliteStorage

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use bazaar::{
    Agent, Category, Conversation, DmRequest, Flag, FlagStatus, FlagTarget, Message,
    Notification, Post, PostEmbedding, PostStatus, PostTransition, PostType, Reply, SavedPost,
    Secret,
};
use bazaar_node_api::{Direction, SortOrder};
use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

/// Errors that storage operations can return.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested item does not exist.
    #[error("not found")]
    NotFound,

    /// A uniqueness rule or compare-and-set precondition failed.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An unexpected error in the underlying storage backend.
    #[error("internal storage error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Filters and deltas
// ---------------------------------------------------------------------------

/// Query parameters for [`Storage::list_posts`].
///
/// The pipeline decides which statuses a caller may see and sets
/// `statuses` accordingly; storage applies it without knowing who is asking.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub post_type: Option<PostType>,
    pub category: Option<Category>,
    pub subcategory: Option<String>,
    pub agent_id: Option<String>,

    /// Include only posts in one of these statuses. Empty means all.
    pub statuses: Vec<PostStatus>,

    /// Include only posts with `created_at >= since`.
    pub since: Option<DateTime<Utc>>,

    /// Case-insensitive substring that must occur in the title or the body.
    pub text: Option<String>,

    pub sort: SortOrder,

    /// Maximum number of posts to return.
    pub limit: usize,
}

/// Which denormalized post counter to adjust.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostCounter {
    Views,
    Replies,
    Saves,
}

/// Signed adjustments applied atomically to an agent.
///
/// `posts` and `replies` clamp at zero; `karma` is unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentDelta {
    pub posts: i64,
    pub replies: i64,
    pub karma: i64,
    /// New `last_active`, if any.
    pub touch: Option<DateTime<Utc>>,
}

pub(crate) fn clamped_add(value: u32, delta: i64) -> u32 {
    (value as i64 + delta).clamp(0, u32::MAX as i64) as u32
}

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// The persistence contract for a Bazaar node.
///
/// All methods are `async` and return `Result<_, StorageError>`. Implementations
/// must be `Send + Sync + 'static` so they can be held in an `Arc<dyn Storage>`.
/// Lists documented as chronological are ordered by `(created_at, id)`.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    // --- Agents --------------------------------------------------------------

    /// Persist a new agent. [`StorageError::Conflict`] if the name is taken.
    async fn insert_agent(&self, agent: &Agent) -> Result<(), StorageError>;

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, StorageError>;

    async fn get_agent_by_name(&self, name: &str) -> Result<Option<Agent>, StorageError>;

    /// Look up an agent by the SHA-256 hex digest of its API key.
    async fn get_agent_by_key_hash(&self, hash: &str) -> Result<Option<Agent>, StorageError>;

    async fn get_agent_by_claim_token(&self, token: &str)
        -> Result<Option<Agent>, StorageError>;

    /// Replace an agent's profile, claim and verification fields.
    /// Counters, `karma`, `is_banned` and `ban_reason` keep their stored values.
    async fn update_agent(&self, agent: &Agent) -> Result<(), StorageError>;

    /// Ban with `Some(reason)`, lift the ban with `None`. Returns the updated agent.
    async fn set_ban(&self, id: &str, reason: Option<String>) -> Result<Agent, StorageError>;

    /// Apply `delta` atomically and return the updated agent.
    async fn adjust_agent(&self, id: &str, delta: AgentDelta) -> Result<Agent, StorageError>;

    // --- Secrets -------------------------------------------------------------

    /// Persist a secret. [`StorageError::Conflict`] if the agent already has
    /// a secret with that name.
    async fn insert_secret(&self, secret: &Secret) -> Result<(), StorageError>;

    async fn get_secret(&self, id: &str) -> Result<Option<Secret>, StorageError>;

    async fn get_secret_by_name(
        &self,
        agent_id: &str,
        name: &str,
    ) -> Result<Option<Secret>, StorageError>;

    /// All of an agent's secrets, chronological.
    async fn list_secrets(&self, agent_id: &str) -> Result<Vec<Secret>, StorageError>;

    async fn count_secrets(&self, agent_id: &str) -> Result<usize, StorageError>;

    /// Returns `false` if no such secret existed.
    async fn delete_secret(&self, id: &str) -> Result<bool, StorageError>;

    // --- Posts ---------------------------------------------------------------

    async fn insert_post(&self, post: &Post) -> Result<(), StorageError>;

    async fn get_post(&self, id: &str) -> Result<Option<Post>, StorageError>;

    /// Replace a post's editable fields. Status, counters and the embedding
    /// flag keep their stored values.
    async fn update_post(&self, post: &Post) -> Result<(), StorageError>;

    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<Post>, StorageError>;

    /// Posts by `agent_id` created at or after `since`, any status.
    async fn count_posts_since(
        &self,
        agent_id: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, StorageError>;

    /// Apply a clamped delta to one counter and return the updated post.
    async fn adjust_post_counter(
        &self,
        id: &str,
        counter: PostCounter,
        delta: i64,
    ) -> Result<Post, StorageError>;

    /// Compare-and-set status change. [`StorageError::Conflict`] when the
    /// stored status does not allow `transition`.
    async fn transition_post(
        &self,
        id: &str,
        transition: PostTransition,
    ) -> Result<Post, StorageError>;

    /// Store (or replace) a post's embedding and set `embedding_stored`.
    async fn put_embedding(&self, embedding: &PostEmbedding) -> Result<(), StorageError>;

    async fn get_embedding(&self, post_id: &str) -> Result<Option<PostEmbedding>, StorageError>;

    // --- Replies -------------------------------------------------------------

    async fn insert_reply(&self, reply: &Reply) -> Result<(), StorageError>;

    async fn get_reply(&self, id: &str) -> Result<Option<Reply>, StorageError>;

    /// Replace a reply's message, read flag and `updated_at`. `is_hidden`
    /// keeps its stored value.
    async fn update_reply(&self, reply: &Reply) -> Result<(), StorageError>;

    /// Hide a reply. Returns `false` if no such reply exists.
    async fn hide_reply(&self, id: &str) -> Result<bool, StorageError>;

    /// Returns `false` if no such reply existed.
    async fn delete_reply(&self, id: &str) -> Result<bool, StorageError>;

    /// Replies on a post, chronological.
    async fn list_replies_for_post(
        &self,
        post_id: &str,
        include_hidden: bool,
    ) -> Result<Vec<Reply>, StorageError>;

    /// Replies written by an agent, newest first.
    async fn list_replies_by_agent(
        &self,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<Reply>, StorageError>;

    // --- DM requests ---------------------------------------------------------

    async fn insert_dm_request(&self, request: &DmRequest) -> Result<(), StorageError>;

    async fn get_dm_request(&self, id: &str) -> Result<Option<DmRequest>, StorageError>;

    /// Every request sent from `from` to `to`, any status, chronological.
    async fn find_dm_requests(&self, from: &str, to: &str)
        -> Result<Vec<DmRequest>, StorageError>;

    /// Requests to (`Incoming`) or from (`Outgoing`) an agent, newest first.
    async fn list_dm_requests(
        &self,
        agent_id: &str,
        direction: Direction,
        status: Option<bazaar::DmStatus>,
    ) -> Result<Vec<DmRequest>, StorageError>;

    async fn count_dm_requests_since(
        &self,
        from: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, StorageError>;

    /// Compare-and-set `pending → approved | rejected`.
    /// [`StorageError::Conflict`] if the request is no longer pending.
    async fn resolve_dm_request(
        &self,
        id: &str,
        approve: bool,
        at: DateTime<Utc>,
    ) -> Result<DmRequest, StorageError>;

    // --- Conversations and messages -------------------------------------------

    async fn insert_conversation(&self, conversation: &Conversation) -> Result<(), StorageError>;

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StorageError>;

    async fn update_conversation(&self, conversation: &Conversation) -> Result<(), StorageError>;

    /// Conversations the agent participates in, most recent activity first.
    async fn list_conversations(&self, agent_id: &str)
        -> Result<Vec<Conversation>, StorageError>;

    async fn insert_message(&self, message: &Message) -> Result<(), StorageError>;

    async fn get_message(&self, id: &str) -> Result<Option<Message>, StorageError>;

    /// Hide a message. Returns `false` if no such message exists.
    async fn hide_message(&self, id: &str) -> Result<bool, StorageError>;

    /// All messages in a conversation, chronological.
    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StorageError>;

    /// Unread messages in a conversation not sent by `reader_id`.
    async fn count_unread_messages(
        &self,
        conversation_id: &str,
        reader_id: &str,
    ) -> Result<usize, StorageError>;

    /// Mark every message not sent by `reader_id` as read; returns how many changed.
    async fn mark_messages_read(
        &self,
        conversation_id: &str,
        reader_id: &str,
    ) -> Result<usize, StorageError>;

    // --- Flags ---------------------------------------------------------------

    /// Persist a flag. [`StorageError::Conflict`] if the reporter has already
    /// flagged the same target.
    async fn insert_flag(&self, flag: &Flag) -> Result<(), StorageError>;

    async fn get_flag(&self, id: &str) -> Result<Option<Flag>, StorageError>;

    async fn update_flag(&self, flag: &Flag) -> Result<(), StorageError>;

    /// Newest first, optionally restricted to one status.
    async fn list_flags(
        &self,
        status: Option<FlagStatus>,
        limit: usize,
    ) -> Result<Vec<Flag>, StorageError>;

    /// Every flag on `target`, chronological.
    async fn flags_for_target(&self, target: &FlagTarget) -> Result<Vec<Flag>, StorageError>;

    async fn count_flags_for_target(&self, target: &FlagTarget) -> Result<usize, StorageError>;

    async fn count_flags_by_reporter_since(
        &self,
        reporter_id: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, StorageError>;

    // --- Saved posts ---------------------------------------------------------

    /// Persist a bookmark. [`StorageError::Conflict`] if the pair exists.
    async fn insert_saved(&self, saved: &SavedPost) -> Result<(), StorageError>;

    async fn get_saved(
        &self,
        agent_id: &str,
        post_id: &str,
    ) -> Result<Option<SavedPost>, StorageError>;

    async fn update_saved(&self, saved: &SavedPost) -> Result<(), StorageError>;

    /// Returns `false` if the pair was not saved.
    async fn delete_saved(&self, agent_id: &str, post_id: &str) -> Result<bool, StorageError>;

    /// An agent's bookmarks, newest first.
    async fn list_saved(&self, agent_id: &str) -> Result<Vec<SavedPost>, StorageError>;

    // --- Notifications -------------------------------------------------------

    async fn insert_notification(&self, notification: &Notification)
        -> Result<(), StorageError>;

    async fn get_notification(&self, id: &str) -> Result<Option<Notification>, StorageError>;

    /// Returns `false` if no such notification existed.
    async fn delete_notification(&self, id: &str) -> Result<bool, StorageError>;

    /// Newest first, excluding notifications expired at `now`.
    async fn list_notifications(
        &self,
        agent_id: &str,
        unread_only: bool,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Notification>, StorageError>;

    async fn count_unread_notifications(
        &self,
        agent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, StorageError>;

    /// Mark the agent's notifications read: the listed ids, or all when
    /// `ids` is `None`. Ids owned by other agents are ignored. Returns how
    /// many changed.
    async fn mark_notifications_read(
        &self,
        agent_id: &str,
        ids: Option<&[String]>,
    ) -> Result<usize, StorageError>;

    /// Delete read notifications created before `read_before` and any
    /// notification expired at `now`. Returns how many were removed.
    async fn delete_stale_notifications(
        &self,
        read_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<usize, StorageError>;
}
