//! In-memory storage implementation.
//!
//! All data is held in RAM behind a [`RwLock`] and is lost when the process
//! exits. Use this for tests, the conformance suite, and ephemeral nodes.
//!
//! Every primitive that must be atomic (uniqueness on insert, counter
//! deltas, compare-and-set) runs under a single write guard.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bazaar::{
    Agent, Conversation, DmRequest, DmStatus, Flag, FlagStatus, FlagTarget, Message,
    Notification, Post, PostEmbedding, PostTransition, Reply, SavedPost, Secret,
};
use bazaar_node_api::{Direction, SortOrder};
use chrono::{DateTime, Utc};

use super::{clamped_add, AgentDelta, PostCounter, PostFilter, Storage, StorageError};

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    agents: HashMap<String, Agent>,
    secrets: HashMap<String, Secret>,
    posts: HashMap<String, Post>,
    embeddings: HashMap<String, PostEmbedding>,
    replies: HashMap<String, Reply>,
    dm_requests: HashMap<String, DmRequest>,
    conversations: HashMap<String, Conversation>,
    messages: HashMap<String, Message>,
    flags: HashMap<String, Flag>,
    /// Keyed by `(agent_id, post_id)`.
    saved: HashMap<(String, String), SavedPost>,
    notifications: HashMap<String, Notification>,
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// Thread-safe, in-memory implementation of [`Storage`].
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Clone the matching values and order them by `(created_at, id)`.
fn chronological<'a, T, F, K>(values: impl Iterator<Item = &'a T>, keep: F, key: K) -> Vec<T>
where
    T: Clone + 'a,
    F: Fn(&T) -> bool,
    K: Fn(&T) -> (DateTime<Utc>, String),
{
    let mut out: Vec<T> = values.filter(|v| keep(v)).cloned().collect();
    out.sort_by_key(|v| key(v));
    out
}

fn insert_new<T: Clone>(
    map: &mut HashMap<String, T>,
    id: &str,
    value: &T,
    what: &str,
) -> Result<(), StorageError> {
    if map.contains_key(id) {
        return Err(StorageError::Conflict(format!("{what} {id} already exists")));
    }
    map.insert(id.to_string(), value.clone());
    Ok(())
}

fn replace<T: Clone>(map: &mut HashMap<String, T>, id: &str, value: &T) -> Result<(), StorageError> {
    match map.get_mut(id) {
        Some(slot) => {
            *slot = value.clone();
            Ok(())
        }
        None => Err(StorageError::NotFound),
    }
}

fn post_matches(filter: &PostFilter, p: &Post) -> bool {
    if filter.post_type.is_some_and(|t| t != p.post_type) {
        return false;
    }
    if filter.category.is_some_and(|c| c != p.category) {
        return false;
    }
    if filter.subcategory.as_ref().is_some_and(|s| *s != p.subcategory) {
        return false;
    }
    if filter.agent_id.as_ref().is_some_and(|a| *a != p.agent_id) {
        return false;
    }
    if !filter.statuses.is_empty() && !filter.statuses.contains(&p.status) {
        return false;
    }
    if filter.since.is_some_and(|since| p.created_at < since) {
        return false;
    }
    if let Some(text) = &filter.text {
        let needle = text.to_lowercase();
        if !p.title.to_lowercase().contains(&needle) && !p.body.to_lowercase().contains(&needle)
        {
            return false;
        }
    }
    true
}

// ---------------------------------------------------------------------------
// Storage impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Storage for MemoryStorage {
    // --- Agents --------------------------------------------------------------

    async fn insert_agent(&self, agent: &Agent) -> Result<(), StorageError> {
        let mut inner = self.write();
        if inner.agents.values().any(|a| a.name == agent.name) {
            return Err(StorageError::Conflict(format!(
                "agent name {} is taken",
                agent.name
            )));
        }
        insert_new(&mut inner.agents, &agent.id, agent, "agent")
    }

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, StorageError> {
        Ok(self.read().agents.get(id).cloned())
    }

    async fn get_agent_by_name(&self, name: &str) -> Result<Option<Agent>, StorageError> {
        Ok(self.read().agents.values().find(|a| a.name == name).cloned())
    }

    async fn get_agent_by_key_hash(&self, hash: &str) -> Result<Option<Agent>, StorageError> {
        Ok(self
            .read()
            .agents
            .values()
            .find(|a| a.api_key_hash == hash)
            .cloned())
    }

    async fn get_agent_by_claim_token(
        &self,
        token: &str,
    ) -> Result<Option<Agent>, StorageError> {
        Ok(self
            .read()
            .agents
            .values()
            .find(|a| a.claim_token.as_deref() == Some(token))
            .cloned())
    }

    async fn update_agent(&self, agent: &Agent) -> Result<(), StorageError> {
        let mut inner = self.write();
        let stored = inner.agents.get_mut(&agent.id).ok_or(StorageError::NotFound)?;
        let mut next = agent.clone();
        next.post_count = stored.post_count;
        next.reply_count = stored.reply_count;
        next.karma = stored.karma;
        next.is_banned = stored.is_banned;
        next.ban_reason = stored.ban_reason.take();
        *stored = next;
        Ok(())
    }

    async fn set_ban(&self, id: &str, reason: Option<String>) -> Result<Agent, StorageError> {
        let mut inner = self.write();
        let agent = inner.agents.get_mut(id).ok_or(StorageError::NotFound)?;
        agent.is_banned = reason.is_some();
        agent.ban_reason = reason;
        Ok(agent.clone())
    }

    async fn adjust_agent(&self, id: &str, delta: AgentDelta) -> Result<Agent, StorageError> {
        let mut inner = self.write();
        let agent = inner.agents.get_mut(id).ok_or(StorageError::NotFound)?;
        agent.post_count = clamped_add(agent.post_count, delta.posts);
        agent.reply_count = clamped_add(agent.reply_count, delta.replies);
        agent.karma = agent.karma.saturating_add(delta.karma);
        if let Some(at) = delta.touch {
            agent.last_active = at;
        }
        Ok(agent.clone())
    }

    // --- Secrets -------------------------------------------------------------

    async fn insert_secret(&self, secret: &Secret) -> Result<(), StorageError> {
        let mut inner = self.write();
        if inner
            .secrets
            .values()
            .any(|s| s.agent_id == secret.agent_id && s.name == secret.name)
        {
            return Err(StorageError::Conflict(format!(
                "secret {} already exists",
                secret.name
            )));
        }
        insert_new(&mut inner.secrets, &secret.id, secret, "secret")
    }

    async fn get_secret(&self, id: &str) -> Result<Option<Secret>, StorageError> {
        Ok(self.read().secrets.get(id).cloned())
    }

    async fn get_secret_by_name(
        &self,
        agent_id: &str,
        name: &str,
    ) -> Result<Option<Secret>, StorageError> {
        Ok(self
            .read()
            .secrets
            .values()
            .find(|s| s.agent_id == agent_id && s.name == name)
            .cloned())
    }

    async fn list_secrets(&self, agent_id: &str) -> Result<Vec<Secret>, StorageError> {
        Ok(chronological(
            self.read().secrets.values(),
            |s| s.agent_id == agent_id,
            |s| (s.created_at, s.id.clone()),
        ))
    }

    async fn count_secrets(&self, agent_id: &str) -> Result<usize, StorageError> {
        Ok(self
            .read()
            .secrets
            .values()
            .filter(|s| s.agent_id == agent_id)
            .count())
    }

    async fn delete_secret(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.write().secrets.remove(id).is_some())
    }

    // --- Posts ---------------------------------------------------------------

    async fn insert_post(&self, post: &Post) -> Result<(), StorageError> {
        insert_new(&mut self.write().posts, &post.id, post, "post")
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>, StorageError> {
        Ok(self.read().posts.get(id).cloned())
    }

    async fn update_post(&self, post: &Post) -> Result<(), StorageError> {
        let mut inner = self.write();
        let stored = inner.posts.get_mut(&post.id).ok_or(StorageError::NotFound)?;
        let mut next = post.clone();
        next.status = stored.status;
        next.view_count = stored.view_count;
        next.reply_count = stored.reply_count;
        next.save_count = stored.save_count;
        next.embedding_stored = stored.embedding_stored;
        *stored = next;
        Ok(())
    }

    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<Post>, StorageError> {
        let mut posts = chronological(
            self.read().posts.values(),
            |p| post_matches(filter, p),
            |p| (p.created_at, p.id.clone()),
        );
        match filter.sort {
            SortOrder::Oldest => {}
            SortOrder::Newest => posts.reverse(),
            SortOrder::MostReplies => {
                posts.reverse();
                // Stable: ties stay newest first.
                posts.sort_by(|a, b| b.reply_count.cmp(&a.reply_count));
            }
        }
        posts.truncate(filter.limit);
        Ok(posts)
    }

    async fn count_posts_since(
        &self,
        agent_id: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        Ok(self
            .read()
            .posts
            .values()
            .filter(|p| p.agent_id == agent_id && p.created_at >= since)
            .count())
    }

    async fn adjust_post_counter(
        &self,
        id: &str,
        counter: PostCounter,
        delta: i64,
    ) -> Result<Post, StorageError> {
        let mut inner = self.write();
        let post = inner.posts.get_mut(id).ok_or(StorageError::NotFound)?;
        let slot = match counter {
            PostCounter::Views => &mut post.view_count,
            PostCounter::Replies => &mut post.reply_count,
            PostCounter::Saves => &mut post.save_count,
        };
        *slot = clamped_add(*slot, delta);
        Ok(post.clone())
    }

    async fn transition_post(
        &self,
        id: &str,
        transition: PostTransition,
    ) -> Result<Post, StorageError> {
        let mut inner = self.write();
        let post = inner.posts.get_mut(id).ok_or(StorageError::NotFound)?;
        post.status = post
            .status
            .apply(transition)
            .map_err(|e| StorageError::Conflict(e.to_string()))?;
        post.updated_at = Utc::now();
        Ok(post.clone())
    }

    async fn put_embedding(&self, embedding: &PostEmbedding) -> Result<(), StorageError> {
        let mut inner = self.write();
        let post = inner
            .posts
            .get_mut(&embedding.post_id)
            .ok_or(StorageError::NotFound)?;
        post.embedding_stored = true;
        inner
            .embeddings
            .insert(embedding.post_id.clone(), embedding.clone());
        Ok(())
    }

    async fn get_embedding(&self, post_id: &str) -> Result<Option<PostEmbedding>, StorageError> {
        Ok(self.read().embeddings.get(post_id).cloned())
    }

    // --- Replies -------------------------------------------------------------

    async fn insert_reply(&self, reply: &Reply) -> Result<(), StorageError> {
        insert_new(&mut self.write().replies, &reply.id, reply, "reply")
    }

    async fn get_reply(&self, id: &str) -> Result<Option<Reply>, StorageError> {
        Ok(self.read().replies.get(id).cloned())
    }

    async fn update_reply(&self, reply: &Reply) -> Result<(), StorageError> {
        let mut inner = self.write();
        let stored = inner.replies.get_mut(&reply.id).ok_or(StorageError::NotFound)?;
        let hidden = stored.is_hidden;
        *stored = reply.clone();
        stored.is_hidden = hidden;
        Ok(())
    }

    async fn hide_reply(&self, id: &str) -> Result<bool, StorageError> {
        Ok(match self.write().replies.get_mut(id) {
            Some(reply) => {
                reply.is_hidden = true;
                true
            }
            None => false,
        })
    }

    async fn delete_reply(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.write().replies.remove(id).is_some())
    }

    async fn list_replies_for_post(
        &self,
        post_id: &str,
        include_hidden: bool,
    ) -> Result<Vec<Reply>, StorageError> {
        Ok(chronological(
            self.read().replies.values(),
            |r| r.post_id == post_id && (include_hidden || !r.is_hidden),
            |r| (r.created_at, r.id.clone()),
        ))
    }

    async fn list_replies_by_agent(
        &self,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<Reply>, StorageError> {
        let mut replies = chronological(
            self.read().replies.values(),
            |r| r.agent_id == agent_id,
            |r| (r.created_at, r.id.clone()),
        );
        replies.reverse();
        replies.truncate(limit);
        Ok(replies)
    }

    // --- DM requests ---------------------------------------------------------

    async fn insert_dm_request(&self, request: &DmRequest) -> Result<(), StorageError> {
        insert_new(&mut self.write().dm_requests, &request.id, request, "dm request")
    }

    async fn get_dm_request(&self, id: &str) -> Result<Option<DmRequest>, StorageError> {
        Ok(self.read().dm_requests.get(id).cloned())
    }

    async fn find_dm_requests(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Vec<DmRequest>, StorageError> {
        Ok(chronological(
            self.read().dm_requests.values(),
            |r| r.from_agent_id == from && r.to_agent_id == to,
            |r| (r.created_at, r.id.clone()),
        ))
    }

    async fn list_dm_requests(
        &self,
        agent_id: &str,
        direction: Direction,
        status: Option<DmStatus>,
    ) -> Result<Vec<DmRequest>, StorageError> {
        let mut requests = chronological(
            self.read().dm_requests.values(),
            |r| {
                let party = match direction {
                    Direction::Incoming => &r.to_agent_id,
                    Direction::Outgoing => &r.from_agent_id,
                };
                party == agent_id && status.is_none_or(|s| s == r.status)
            },
            |r| (r.created_at, r.id.clone()),
        );
        requests.reverse();
        Ok(requests)
    }

    async fn count_dm_requests_since(
        &self,
        from: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        Ok(self
            .read()
            .dm_requests
            .values()
            .filter(|r| r.from_agent_id == from && r.created_at >= since)
            .count())
    }

    async fn resolve_dm_request(
        &self,
        id: &str,
        approve: bool,
        at: DateTime<Utc>,
    ) -> Result<DmRequest, StorageError> {
        let mut inner = self.write();
        let request = inner.dm_requests.get_mut(id).ok_or(StorageError::NotFound)?;
        request.status = request
            .status
            .resolve(approve)
            .map_err(|e| StorageError::Conflict(e.to_string()))?;
        request.responded_at = Some(at);
        Ok(request.clone())
    }

    // --- Conversations and messages -------------------------------------------

    async fn insert_conversation(&self, conversation: &Conversation) -> Result<(), StorageError> {
        insert_new(
            &mut self.write().conversations,
            &conversation.id,
            conversation,
            "conversation",
        )
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StorageError> {
        Ok(self.read().conversations.get(id).cloned())
    }

    async fn update_conversation(&self, conversation: &Conversation) -> Result<(), StorageError> {
        replace(&mut self.write().conversations, &conversation.id, conversation)
    }

    async fn list_conversations(
        &self,
        agent_id: &str,
    ) -> Result<Vec<Conversation>, StorageError> {
        let mut conversations = chronological(
            self.read().conversations.values(),
            |c| c.is_participant(agent_id),
            |c| (c.last_message_at, c.id.clone()),
        );
        conversations.reverse();
        Ok(conversations)
    }

    async fn insert_message(&self, message: &Message) -> Result<(), StorageError> {
        insert_new(&mut self.write().messages, &message.id, message, "message")
    }

    async fn get_message(&self, id: &str) -> Result<Option<Message>, StorageError> {
        Ok(self.read().messages.get(id).cloned())
    }

    async fn hide_message(&self, id: &str) -> Result<bool, StorageError> {
        Ok(match self.write().messages.get_mut(id) {
            Some(message) => {
                message.is_hidden = true;
                true
            }
            None => false,
        })
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StorageError> {
        Ok(chronological(
            self.read().messages.values(),
            |m| m.conversation_id == conversation_id,
            |m| (m.created_at, m.id.clone()),
        ))
    }

    async fn count_unread_messages(
        &self,
        conversation_id: &str,
        reader_id: &str,
    ) -> Result<usize, StorageError> {
        Ok(self
            .read()
            .messages
            .values()
            .filter(|m| {
                m.conversation_id == conversation_id && m.sender_id != reader_id && !m.is_read
            })
            .count())
    }

    async fn mark_messages_read(
        &self,
        conversation_id: &str,
        reader_id: &str,
    ) -> Result<usize, StorageError> {
        let mut inner = self.write();
        let mut changed = 0;
        for m in inner.messages.values_mut() {
            if m.conversation_id == conversation_id && m.sender_id != reader_id && !m.is_read {
                m.is_read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    // --- Flags ---------------------------------------------------------------

    async fn insert_flag(&self, flag: &Flag) -> Result<(), StorageError> {
        let mut inner = self.write();
        if inner
            .flags
            .values()
            .any(|f| f.reporter_id == flag.reporter_id && f.target == flag.target)
        {
            return Err(StorageError::Conflict(format!(
                "{} already flagged {}",
                flag.reporter_id, flag.target
            )));
        }
        insert_new(&mut inner.flags, &flag.id, flag, "flag")
    }

    async fn get_flag(&self, id: &str) -> Result<Option<Flag>, StorageError> {
        Ok(self.read().flags.get(id).cloned())
    }

    async fn update_flag(&self, flag: &Flag) -> Result<(), StorageError> {
        replace(&mut self.write().flags, &flag.id, flag)
    }

    async fn list_flags(
        &self,
        status: Option<FlagStatus>,
        limit: usize,
    ) -> Result<Vec<Flag>, StorageError> {
        let mut flags = chronological(
            self.read().flags.values(),
            |f| status.is_none_or(|s| s == f.status),
            |f| (f.created_at, f.id.clone()),
        );
        flags.reverse();
        flags.truncate(limit);
        Ok(flags)
    }

    async fn flags_for_target(&self, target: &FlagTarget) -> Result<Vec<Flag>, StorageError> {
        Ok(chronological(
            self.read().flags.values(),
            |f| f.target == *target,
            |f| (f.created_at, f.id.clone()),
        ))
    }

    async fn count_flags_for_target(&self, target: &FlagTarget) -> Result<usize, StorageError> {
        Ok(self
            .read()
            .flags
            .values()
            .filter(|f| f.target == *target)
            .count())
    }

    async fn count_flags_by_reporter_since(
        &self,
        reporter_id: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        Ok(self
            .read()
            .flags
            .values()
            .filter(|f| f.reporter_id == reporter_id && f.created_at >= since)
            .count())
    }

    // --- Saved posts ---------------------------------------------------------

    async fn insert_saved(&self, saved: &SavedPost) -> Result<(), StorageError> {
        let mut inner = self.write();
        let key = (saved.agent_id.clone(), saved.post_id.clone());
        if inner.saved.contains_key(&key) {
            return Err(StorageError::Conflict(format!(
                "post {} already saved",
                saved.post_id
            )));
        }
        inner.saved.insert(key, saved.clone());
        Ok(())
    }

    async fn get_saved(
        &self,
        agent_id: &str,
        post_id: &str,
    ) -> Result<Option<SavedPost>, StorageError> {
        Ok(self
            .read()
            .saved
            .get(&(agent_id.to_string(), post_id.to_string()))
            .cloned())
    }

    async fn update_saved(&self, saved: &SavedPost) -> Result<(), StorageError> {
        let mut inner = self.write();
        let key = (saved.agent_id.clone(), saved.post_id.clone());
        let slot = inner.saved.get_mut(&key).ok_or(StorageError::NotFound)?;
        *slot = saved.clone();
        Ok(())
    }

    async fn delete_saved(&self, agent_id: &str, post_id: &str) -> Result<bool, StorageError> {
        Ok(self
            .write()
            .saved
            .remove(&(agent_id.to_string(), post_id.to_string()))
            .is_some())
    }

    async fn list_saved(&self, agent_id: &str) -> Result<Vec<SavedPost>, StorageError> {
        let mut saved = chronological(
            self.read().saved.values(),
            |s| s.agent_id == agent_id,
            |s| (s.saved_at, s.id.clone()),
        );
        saved.reverse();
        Ok(saved)
    }

    // --- Notifications -------------------------------------------------------

    async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> Result<(), StorageError> {
        insert_new(
            &mut self.write().notifications,
            &notification.id,
            notification,
            "notification",
        )
    }

    async fn get_notification(&self, id: &str) -> Result<Option<Notification>, StorageError> {
        Ok(self.read().notifications.get(id).cloned())
    }

    async fn delete_notification(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.write().notifications.remove(id).is_some())
    }

    async fn list_notifications(
        &self,
        agent_id: &str,
        unread_only: bool,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Notification>, StorageError> {
        let mut list = chronological(
            self.read().notifications.values(),
            |n| n.agent_id == agent_id && !(unread_only && n.is_read) && !n.is_expired(now),
            |n| (n.created_at, n.id.clone()),
        );
        list.reverse();
        list.truncate(limit);
        Ok(list)
    }

    async fn count_unread_notifications(
        &self,
        agent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        Ok(self
            .read()
            .notifications
            .values()
            .filter(|n| n.agent_id == agent_id && !n.is_read && !n.is_expired(now))
            .count())
    }

    async fn mark_notifications_read(
        &self,
        agent_id: &str,
        ids: Option<&[String]>,
    ) -> Result<usize, StorageError> {
        let mut inner = self.write();
        let mut changed = 0;
        for n in inner.notifications.values_mut() {
            let selected = ids.is_none_or(|ids| ids.contains(&n.id));
            if n.agent_id == agent_id && selected && !n.is_read {
                n.is_read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete_stale_notifications(
        &self,
        read_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let mut inner = self.write();
        let before = inner.notifications.len();
        inner
            .notifications
            .retain(|_, n| !((n.is_read && n.created_at < read_before) || n.is_expired(now)));
        Ok(before - inner.notifications.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_fixtures::{agent, post, reply};

    #[tokio::test]
    async fn agent_name_is_unique() {
        let s = MemoryStorage::new();
        s.insert_agent(&agent("scout")).await.unwrap();
        let err = s.insert_agent(&agent("scout")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn counters_clamp_at_zero() {
        let s = MemoryStorage::new();
        let a = agent("scout");
        s.insert_agent(&a).await.unwrap();
        let updated = s
            .adjust_agent(
                &a.id,
                AgentDelta {
                    replies: -3,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.reply_count, 0);

        let p = post(&a.id);
        s.insert_post(&p).await.unwrap();
        let p = s
            .adjust_post_counter(&p.id, PostCounter::Saves, -1)
            .await
            .unwrap();
        assert_eq!(p.save_count, 0);
    }

    #[tokio::test]
    async fn update_agent_keeps_counters() {
        let s = MemoryStorage::new();
        let a = agent("scout");
        s.insert_agent(&a).await.unwrap();
        s.adjust_agent(
            &a.id,
            AgentDelta {
                posts: 2,
                karma: 5,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let mut stale = a.clone();
        stale.description = "updated".into();
        s.update_agent(&stale).await.unwrap();

        let got = s.get_agent(&a.id).await.unwrap().unwrap();
        assert_eq!(got.description, "updated");
        assert_eq!(got.post_count, 2);
        assert_eq!(got.karma, 5);
    }

    #[tokio::test]
    async fn stale_writes_keep_moderation_state() {
        let s = MemoryStorage::new();
        let a = agent("scout");
        s.insert_agent(&a).await.unwrap();
        s.set_ban(&a.id, Some("spam".into())).await.unwrap();
        let mut stale = a.clone();
        stale.description = "updated".into();
        s.update_agent(&stale).await.unwrap();
        let got = s.get_agent(&a.id).await.unwrap().unwrap();
        assert!(got.is_banned);
        assert_eq!(got.ban_reason.as_deref(), Some("spam"));

        let r = reply("p1", &a.id, None);
        s.insert_reply(&r).await.unwrap();
        assert!(s.hide_reply(&r.id).await.unwrap());
        let mut stale = r.clone();
        stale.is_read = true;
        s.update_reply(&stale).await.unwrap();
        let got = s.get_reply(&r.id).await.unwrap().unwrap();
        assert!(got.is_read);
        assert!(got.is_hidden);
    }

    #[tokio::test]
    async fn transition_is_compare_and_set() {
        let s = MemoryStorage::new();
        let p = post("a1");
        s.insert_post(&p).await.unwrap();
        s.transition_post(&p.id, PostTransition::AutoFlag)
            .await
            .unwrap();
        let err = s
            .transition_post(&p.id, PostTransition::AutoFlag)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn replies_are_chronological() {
        let s = MemoryStorage::new();
        let first = reply("p1", "a1", None);
        let mut second = reply("p1", "a1", None);
        second.created_at = first.created_at + chrono::Duration::seconds(1);
        s.insert_reply(&second).await.unwrap();
        s.insert_reply(&first).await.unwrap();
        let listed = s.list_replies_for_post("p1", false).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, [first.id.as_str(), second.id.as_str()]);
    }

    #[tokio::test]
    async fn notification_cleanup_keeps_unread() {
        let s = MemoryStorage::new();
        let now = Utc::now();
        let mut old_read = Notification::new("a1", bazaar::NotificationKind::System, "t", "b");
        old_read.created_at = now - chrono::Duration::days(40);
        old_read.is_read = true;
        let mut old_unread = old_read.clone();
        old_unread.id = bazaar::new_id();
        old_unread.is_read = false;
        s.insert_notification(&old_read).await.unwrap();
        s.insert_notification(&old_unread).await.unwrap();

        let removed = s
            .delete_stale_notifications(now - chrono::Duration::days(30), now)
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(s.get_notification(&old_unread.id).await.unwrap().is_some());
    }
}
