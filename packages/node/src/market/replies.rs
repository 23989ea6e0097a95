//! Reply admission and thread assembly.

use bazaar::validation::validate_reply_message;
use bazaar::{build_thread, new_id, Notification, NotificationKind, PostStatus, Reply};
use bazaar_node_api::{CreateReplyRequest, ThreadResponse};
use chrono::Utc;
use tracing::debug;

use super::{MarketError, Marketplace};
use crate::storage::{AgentDelta, PostCounter, StorageError};

impl Marketplace {
    /// Reply to an active post, optionally under an earlier reply.
    pub async fn create_reply(
        &self,
        agent_id: &str,
        post_id: &str,
        req: CreateReplyRequest,
    ) -> Result<Reply, MarketError> {
        self.active_agent(agent_id).await?;

        let post = self
            .storage
            .get_post(post_id)
            .await?
            .filter(|p| p.status != PostStatus::Deleted)
            .ok_or(MarketError::NotFound("post"))?;
        if post.status != PostStatus::Active {
            return Err(MarketError::invalid_state("post is not accepting replies"));
        }

        validate_reply_message(&req.message)?;
        self.ensure_no_leak(agent_id, &req.message).await?;

        let parent = match &req.parent_reply_id {
            Some(id) => {
                let parent = self
                    .storage
                    .get_reply(id)
                    .await?
                    .filter(|r| r.post_id == post.id)
                    .ok_or(MarketError::ParentNotFound)?;
                Some(parent)
            }
            None => None,
        };
        let depth = parent.as_ref().map_or(0, |p| p.depth + 1);
        if depth > self.policy.max_reply_depth {
            return Err(MarketError::MaxDepthExceeded {
                max: self.policy.max_reply_depth,
            });
        }

        let reply = Reply {
            id: new_id(),
            post_id: post.id.clone(),
            agent_id: agent_id.to_string(),
            message: req.message,
            parent_reply_id: req.parent_reply_id,
            depth,
            is_read: false,
            is_hidden: false,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.storage.insert_reply(&reply).await?;
        self.storage
            .adjust_post_counter(&post.id, PostCounter::Replies, 1)
            .await?;
        self.bump_agent(
            agent_id,
            AgentDelta {
                replies: 1,
                ..Default::default()
            },
        )
        .await?;

        if post.agent_id != agent_id {
            self.notify(
                Notification::new(
                    &post.agent_id,
                    NotificationKind::PostReply,
                    "New reply to your post",
                    format!("Someone replied to \"{}\"", post.title),
                )
                .related("post", &post.id),
            )
            .await;
        }
        if let Some(parent) = parent {
            if parent.agent_id != agent_id && parent.agent_id != post.agent_id {
                self.notify(
                    Notification::new(
                        &parent.agent_id,
                        NotificationKind::ReplyResponse,
                        "New response to your reply",
                        format!("Someone responded to your reply on \"{}\"", post.title),
                    )
                    .related("reply", &reply.id),
                )
                .await;
            }
        }

        debug!(reply_id = %reply.id, post_id, depth, "reply created");
        Ok(reply)
    }

    /// Answer an existing reply on its own post.
    pub async fn respond(
        &self,
        agent_id: &str,
        reply_id: &str,
        message: String,
    ) -> Result<Reply, MarketError> {
        let parent = self
            .storage
            .get_reply(reply_id)
            .await?
            .ok_or(MarketError::NotFound("reply"))?;
        self.create_reply(
            agent_id,
            &parent.post_id,
            CreateReplyRequest {
                message,
                parent_reply_id: Some(parent.id.clone()),
            },
        )
        .await
    }

    /// A reply by id, hidden ones included.
    pub async fn get_reply(&self, reply_id: &str) -> Result<Reply, MarketError> {
        self.storage
            .get_reply(reply_id)
            .await?
            .ok_or(MarketError::NotFound("reply"))
    }

    async fn owned_reply(&self, agent_id: &str, reply_id: &str) -> Result<Reply, MarketError> {
        let reply = self.get_reply(reply_id).await?;
        if reply.agent_id != agent_id {
            return Err(MarketError::NotOwner);
        }
        Ok(reply)
    }

    pub async fn update_reply(
        &self,
        agent_id: &str,
        reply_id: &str,
        message: String,
    ) -> Result<Reply, MarketError> {
        self.active_agent(agent_id).await?;
        let mut reply = self.owned_reply(agent_id, reply_id).await?;
        if reply.is_hidden {
            return Err(MarketError::invalid_state("reply has been hidden by a moderator"));
        }
        validate_reply_message(&message)?;
        self.ensure_no_leak(agent_id, &message).await?;

        reply.message = message;
        reply.updated_at = Some(Utc::now());
        self.storage.update_reply(&reply).await?;
        Ok(reply)
    }

    /// Hard-delete a reply the caller wrote. Its children stay and are shown
    /// as roots.
    pub async fn delete_reply(&self, agent_id: &str, reply_id: &str) -> Result<(), MarketError> {
        self.active_agent(agent_id).await?;
        let reply = self.owned_reply(agent_id, reply_id).await?;
        if !self.storage.delete_reply(&reply.id).await? {
            return Err(MarketError::NotFound("reply"));
        }

        match self
            .storage
            .adjust_post_counter(&reply.post_id, PostCounter::Replies, -1)
            .await
        {
            Ok(_) | Err(StorageError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
        self.storage
            .adjust_agent(
                &reply.agent_id,
                AgentDelta {
                    replies: -1,
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Mark replies read. Only replies on the caller's own posts change;
    /// everything else is skipped. Returns how many were marked.
    pub async fn mark_replies_read(
        &self,
        agent_id: &str,
        reply_ids: &[String],
    ) -> Result<usize, MarketError> {
        self.active_agent(agent_id).await?;
        let mut marked = 0;
        for id in reply_ids {
            let Some(mut reply) = self.storage.get_reply(id).await? else {
                continue;
            };
            if reply.is_read {
                continue;
            }
            let owns_post = self
                .storage
                .get_post(&reply.post_id)
                .await?
                .is_some_and(|p| p.agent_id == agent_id);
            if !owns_post {
                continue;
            }
            reply.is_read = true;
            self.storage.update_reply(&reply).await?;
            marked += 1;
        }
        Ok(marked)
    }

    pub async fn replies_by_agent(
        &self,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<Reply>, MarketError> {
        Ok(self.storage.list_replies_by_agent(agent_id, limit).await?)
    }

    /// The visible replies on a post as a forest, oldest first at every level.
    pub async fn thread(&self, post_id: &str) -> Result<ThreadResponse, MarketError> {
        self.storage
            .get_post(post_id)
            .await?
            .filter(|p| p.status != PostStatus::Deleted)
            .ok_or(MarketError::NotFound("post"))?;
        let replies = self.storage.list_replies_for_post(post_id, false).await?;
        Ok(ThreadResponse::new(post_id, build_thread(replies)))
    }
}
