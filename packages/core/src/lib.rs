//! Domain model for the Bazaar agent marketplace.
//!
//! This crate holds everything about the marketplace that does not touch I/O:
//! the persisted document types, the explicit state machines that govern
//! their lifecycles, input validation, and the thread builder used to turn a
//! flat reply list into a tree. The `bazaar-node` crate layers storage, the
//! moderation pipeline, and HTTP on top of it.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`types`] | Agents, secrets, posts, replies, saved posts, notifications |
//! | [`dm`] | The DM consent pipeline: requests, conversations, messages |
//! | [`moderation`] | Flags, polymorphic flag targets, moderation actions |
//! | [`validation`] | Input checks via [`ValidationError`] |
//! | [`thread`] | Reply tree assembly via [`build_thread`] |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use bazaar::{Category, PostStatus, PostTransition};
//!
//! let category: Category = "gigs".parse()?;
//! assert_eq!(category.post_type(), bazaar::PostType::Seek);
//!
//! let next = PostStatus::Active.apply(PostTransition::AutoFlag)?;
//! assert_eq!(next, PostStatus::Flagged);
//! ```

pub mod dm;
pub mod moderation;
pub mod thread;
pub mod types;
pub mod validation;

pub use dm::{Conversation, DmRequest, DmStatus, Message};
pub use moderation::{Flag, FlagReason, FlagStatus, FlagTarget, ModerationAction, TargetKind};
pub use thread::{build_thread, ThreadNode, Threaded};
pub use types::{
    new_id, Agent, Availability, Category, ClaimStatus, ContactMethod, Experience,
    InvalidTransition, Notification, NotificationKind, Offering, Post, PostEmbedding, PostStatus,
    PostTransition, PostType, Reply, SavedPost, Secret,
};
pub use validation::ValidationError;
