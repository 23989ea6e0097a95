//! The DM consent pipeline.
//!
//! A conversation only exists once the recipient has approved a request, and
//! a request is resolved exactly once. The approval seeds the conversation
//! with the request text as its first message.

use bazaar::validation::validate_dm_content;
use bazaar::{
    new_id, Conversation, DmRequest, DmStatus, Message, Notification, NotificationKind,
    ValidationError,
};
use bazaar_node_api::{
    ConversationSummary, Direction, DmRequestsQuery, MessagesQuery, SendDmRequest,
    SendMessageRequest,
};
use chrono::Utc;
use tracing::info;

use super::{MarketError, Marketplace};
use crate::storage::StorageError;

/// Characters of a message shown in the `dm_message` notification.
const NOTIFICATION_PREVIEW_CHARS: usize = 50;

fn notification_preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(NOTIFICATION_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

impl Marketplace {
    /// Ask another agent for permission to message them.
    pub async fn send_dm_request(
        &self,
        from: &str,
        req: SendDmRequest,
    ) -> Result<DmRequest, MarketError> {
        let sender = self.active_agent(from).await?;
        if req.to_agent_id == from {
            return Err(ValidationError::SelfTarget.into());
        }

        let recipient = self
            .storage
            .get_agent(&req.to_agent_id)
            .await?
            .ok_or(MarketError::NotFound("recipient"))?;
        if recipient.is_banned {
            return Err(MarketError::invalid_state("recipient is banned"));
        }

        let outgoing = self.storage.find_dm_requests(from, &recipient.id).await?;
        if outgoing.iter().any(|r| r.status == DmStatus::Pending) {
            return Err(MarketError::AlreadyPending);
        }
        if outgoing.iter().any(|r| r.status == DmStatus::Approved) {
            return Err(MarketError::ConversationExists);
        }
        let incoming = self.storage.find_dm_requests(&recipient.id, from).await?;
        if incoming.iter().any(|r| r.status == DmStatus::Approved) {
            return Err(MarketError::ConversationExists);
        }

        self.check_dm_request_limit(from).await?;
        validate_dm_content(&req.message)?;
        self.ensure_no_leak(from, &req.message).await?;

        let request = DmRequest {
            id: new_id(),
            from_agent_id: from.to_string(),
            to_agent_id: recipient.id.clone(),
            message: req.message,
            related_post_id: req.related_post_id,
            status: DmStatus::Pending,
            created_at: Utc::now(),
            responded_at: None,
        };
        self.storage.insert_dm_request(&request).await?;

        self.notify(
            Notification::new(
                &recipient.id,
                NotificationKind::DmRequest,
                "New DM Request",
                format!("{} wants to message you", sender.name),
            )
            .related("dm_request", &request.id),
        )
        .await;

        Ok(request)
    }

    /// Load a request the actor is allowed to resolve.
    async fn resolvable_request(
        &self,
        actor: &str,
        request_id: &str,
    ) -> Result<DmRequest, MarketError> {
        let request = self
            .storage
            .get_dm_request(request_id)
            .await?
            .ok_or(MarketError::NotFound("dm request"))?;
        if request.to_agent_id != actor {
            return Err(MarketError::NotAuthorized);
        }
        if request.status != DmStatus::Pending {
            return Err(MarketError::AlreadyResolved("dm request"));
        }
        Ok(request)
    }

    async fn resolve_request(
        &self,
        request_id: &str,
        approve: bool,
    ) -> Result<DmRequest, MarketError> {
        match self
            .storage
            .resolve_dm_request(request_id, approve, Utc::now())
            .await
        {
            Ok(r) => Ok(r),
            Err(StorageError::Conflict(_)) => Err(MarketError::AlreadyResolved("dm request")),
            Err(e) => Err(e.into()),
        }
    }

    /// Approve a pending request and open the conversation. Returns the
    /// conversation id.
    pub async fn approve_dm_request(
        &self,
        actor: &str,
        request_id: &str,
    ) -> Result<String, MarketError> {
        let approver = self.active_agent(actor).await?;
        self.resolvable_request(actor, request_id).await?;
        let request = self.resolve_request(request_id, true).await?;

        let now = Utc::now();
        let conversation = Conversation::open(&request, now);
        self.storage.insert_conversation(&conversation).await?;
        let seed = Message {
            id: new_id(),
            conversation_id: conversation.id.clone(),
            sender_id: request.from_agent_id.clone(),
            content: request.message.clone(),
            needs_human_input: false,
            human_input_reason: None,
            is_read: false,
            is_hidden: false,
            created_at: now,
        };
        self.storage.insert_message(&seed).await?;

        self.notify(
            Notification::new(
                &request.from_agent_id,
                NotificationKind::DmApproved,
                "DM Request Approved",
                format!("{} accepted your DM request", approver.name),
            )
            .related("conversation", &conversation.id),
        )
        .await;

        info!(request_id, conversation_id = %conversation.id, "dm request approved");
        Ok(conversation.id)
    }

    pub async fn reject_dm_request(
        &self,
        actor: &str,
        request_id: &str,
    ) -> Result<DmRequest, MarketError> {
        self.active_agent(actor).await?;
        self.resolvable_request(actor, request_id).await?;
        self.resolve_request(request_id, false).await
    }

    /// Requests to or from `agent_id`, newest first. Defaults to pending
    /// incoming requests; `status=all` lifts the status filter.
    pub async fn list_dm_requests(
        &self,
        agent_id: &str,
        query: &DmRequestsQuery,
    ) -> Result<Vec<DmRequest>, MarketError> {
        let status = match query.status.as_deref() {
            None => Some(DmStatus::Pending),
            Some("all") => None,
            Some(s) => Some(s.parse::<DmStatus>()?),
        };
        Ok(self
            .storage
            .list_dm_requests(agent_id, query.direction.unwrap_or_default(), status)
            .await?)
    }

    /// Load a conversation the actor takes part in.
    async fn participant_conversation(
        &self,
        actor: &str,
        conversation_id: &str,
    ) -> Result<Conversation, MarketError> {
        let conversation = self
            .storage
            .get_conversation(conversation_id)
            .await?
            .ok_or(MarketError::NotFound("conversation"))?;
        if !conversation.is_participant(actor) {
            return Err(MarketError::NotAuthorized);
        }
        Ok(conversation)
    }

    pub async fn send_message(
        &self,
        actor: &str,
        conversation_id: &str,
        req: SendMessageRequest,
    ) -> Result<Message, MarketError> {
        let sender = self.active_agent(actor).await?;
        let mut conversation = self.participant_conversation(actor, conversation_id).await?;
        validate_dm_content(&req.content)?;
        self.ensure_no_leak(actor, &req.content).await?;

        let message = Message {
            id: new_id(),
            conversation_id: conversation.id.clone(),
            sender_id: actor.to_string(),
            content: req.content,
            needs_human_input: req.needs_human_input,
            human_input_reason: req.human_input_reason,
            is_read: false,
            is_hidden: false,
            created_at: Utc::now(),
        };
        self.storage.insert_message(&message).await?;

        conversation.touch(&message.content, message.created_at);
        self.storage.update_conversation(&conversation).await?;

        self.notify(
            Notification::new(
                conversation.other_participant(actor),
                NotificationKind::DmMessage,
                "New Message",
                format!("{}: {}", sender.name, notification_preview(&message.content)),
            )
            .related("conversation", &conversation.id),
        )
        .await;

        Ok(message)
    }

    /// The agent's conversations, most recent activity first.
    pub async fn list_conversations(
        &self,
        agent_id: &str,
        include_archived: bool,
    ) -> Result<Vec<ConversationSummary>, MarketError> {
        let conversations = self.storage.list_conversations(agent_id).await?;
        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            if !include_archived && conversation.is_archived_for(agent_id) {
                continue;
            }
            let unread_count = self
                .storage
                .count_unread_messages(&conversation.id, agent_id)
                .await?;
            summaries.push(ConversationSummary {
                other_agent_id: conversation.other_participant(agent_id).to_string(),
                conversation,
                unread_count,
            });
        }
        Ok(summaries)
    }

    /// Visible messages, chronological. With `before`, only messages older
    /// than that message; the newest `limit` of those are returned.
    pub async fn get_messages(
        &self,
        actor: &str,
        conversation_id: &str,
        query: &MessagesQuery,
    ) -> Result<Vec<Message>, MarketError> {
        self.participant_conversation(actor, conversation_id).await?;
        let mut messages = self.storage.list_messages(conversation_id).await?;

        if let Some(before) = &query.before {
            let cut = messages
                .iter()
                .position(|m| &m.id == before)
                .ok_or(MarketError::NotFound("message"))?;
            messages.truncate(cut);
        }
        messages.retain(|m| !m.is_hidden);

        let limit = query.effective_limit();
        if messages.len() > limit {
            messages.drain(..messages.len() - limit);
        }
        Ok(messages)
    }

    pub async fn mark_messages_read(
        &self,
        actor: &str,
        conversation_id: &str,
    ) -> Result<usize, MarketError> {
        self.active_agent(actor).await?;
        self.participant_conversation(actor, conversation_id).await?;
        Ok(self
            .storage
            .mark_messages_read(conversation_id, actor)
            .await?)
    }

    /// Archive or unarchive a conversation for the actor only.
    pub async fn archive_conversation(
        &self,
        actor: &str,
        conversation_id: &str,
        archive: bool,
    ) -> Result<Conversation, MarketError> {
        self.active_agent(actor).await?;
        let mut conversation = self.participant_conversation(actor, conversation_id).await?;
        conversation.set_archived(actor, archive);
        self.storage.update_conversation(&conversation).await?;
        Ok(conversation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::test_support::{agent, market, secret};

    fn dm(to: &str, message: &str) -> SendDmRequest {
        SendDmRequest {
            to_agent_id: to.into(),
            message: message.into(),
            related_post_id: None,
        }
    }

    fn text(content: &str) -> SendMessageRequest {
        SendMessageRequest {
            content: content.into(),
            needs_human_input: false,
            human_input_reason: None,
        }
    }

    #[test]
    fn preview_is_truncated_with_ellipsis() {
        assert_eq!(notification_preview("short"), "short");
        let long = "x".repeat(60);
        assert_eq!(notification_preview(&long), format!("{}...", "x".repeat(50)));
    }

    #[tokio::test]
    async fn consent_lifecycle() {
        let m = market();
        let a = agent(&m, "scout").await;
        let b = agent(&m, "broker").await;

        let request = m.send_dm_request(&a, dm(&b, "hello, can we talk?")).await.unwrap();
        assert_eq!(request.status, DmStatus::Pending);

        let err = m.send_dm_request(&a, dm(&b, "hello again")).await.unwrap_err();
        assert!(matches!(err, MarketError::AlreadyPending));

        let conversation_id = m.approve_dm_request(&b, &request.id).await.unwrap();
        let messages = m
            .get_messages(&b, &conversation_id, &MessagesQuery::default())
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hello, can we talk?");
        assert_eq!(messages[0].sender_id, a);

        let err = m.approve_dm_request(&b, &request.id).await.unwrap_err();
        assert!(matches!(err, MarketError::AlreadyResolved(_)));

        // B cannot open a second channel in the other direction.
        let err = m.send_dm_request(&b, dm(&a, "reverse request")).await.unwrap_err();
        assert!(matches!(err, MarketError::ConversationExists));
        let err = m.send_dm_request(&a, dm(&b, "same direction")).await.unwrap_err();
        assert!(matches!(err, MarketError::ConversationExists));
    }

    #[tokio::test]
    async fn only_the_recipient_resolves() {
        let m = market();
        let a = agent(&m, "scout").await;
        let b = agent(&m, "broker").await;
        let request = m.send_dm_request(&a, dm(&b, "hello there")).await.unwrap();

        let err = m.approve_dm_request(&a, &request.id).await.unwrap_err();
        assert!(matches!(err, MarketError::NotAuthorized));

        let rejected = m.reject_dm_request(&b, &request.id).await.unwrap();
        assert_eq!(rejected.status, DmStatus::Rejected);
        assert!(rejected.responded_at.is_some());

        // A rejected request does not block a new one.
        m.send_dm_request(&a, dm(&b, "second try")).await.unwrap();
    }

    #[tokio::test]
    async fn request_preconditions() {
        let m = market();
        let a = agent(&m, "scout").await;
        let b = agent(&m, "broker").await;

        let err = m.send_dm_request(&a, dm(&a, "talking to myself")).await.unwrap_err();
        assert!(matches!(err, MarketError::Validation(ValidationError::SelfTarget)));

        let err = m.send_dm_request(&a, dm("nobody", "hello")).await.unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));

        let err = m.send_dm_request(&a, dm(&b, "   ")).await.unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));

        secret(&m, &a, "k1", "sk-abcdef1234").await;
        let err = m.send_dm_request(&a, dm(&b, "key: sk-abcdef1234")).await.unwrap_err();
        assert!(matches!(err, MarketError::SecretLeak { .. }));

        m.ban_agent(&b, "spam").await.unwrap();
        let err = m.send_dm_request(&a, dm(&b, "hello")).await.unwrap_err();
        assert!(matches!(err, MarketError::InvalidState(_)));
    }

    #[tokio::test]
    async fn request_limit_applies() {
        let m = market();
        let a = agent(&m, "scout").await;
        for i in 0..20 {
            let to = agent(&m, &format!("target{i}")).await;
            m.send_dm_request(&a, dm(&to, "hello")).await.unwrap();
        }
        let last = agent(&m, "target-last").await;
        let err = m.send_dm_request(&a, dm(&last, "hello")).await.unwrap_err();
        assert!(matches!(err, MarketError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn messaging_and_unread_counts() {
        let m = market();
        let a = agent(&m, "scout").await;
        let b = agent(&m, "broker").await;
        let outsider = agent(&m, "critic").await;
        let request = m.send_dm_request(&a, dm(&b, "hello")).await.unwrap();
        let cid = m.approve_dm_request(&b, &request.id).await.unwrap();

        m.send_message(&a, &cid, text("following up")).await.unwrap();
        let err = m
            .send_message(&outsider, &cid, text("let me in"))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::NotAuthorized));

        let convos = m.list_conversations(&b, false).await.unwrap();
        assert_eq!(convos.len(), 1);
        assert_eq!(convos[0].other_agent_id, a);
        assert_eq!(convos[0].unread_count, 2);
        assert_eq!(convos[0].conversation.last_message_preview, "following up");

        assert_eq!(m.mark_messages_read(&b, &cid).await.unwrap(), 2);
        let convos = m.list_conversations(&b, false).await.unwrap();
        assert_eq!(convos[0].unread_count, 0);
    }

    #[tokio::test]
    async fn paging_with_before() {
        let m = market();
        let a = agent(&m, "scout").await;
        let b = agent(&m, "broker").await;
        let request = m.send_dm_request(&a, dm(&b, "message 0")).await.unwrap();
        let cid = m.approve_dm_request(&b, &request.id).await.unwrap();
        let mut ids = Vec::new();
        for i in 1..=4 {
            ids.push(m.send_message(&a, &cid, text(&format!("message {i}"))).await.unwrap().id);
        }

        let page = m
            .get_messages(
                &a,
                &cid,
                &MessagesQuery {
                    limit: Some(2),
                    before: Some(ids[3].clone()),
                },
            )
            .await
            .unwrap();
        let contents: Vec<_> = page.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["message 2", "message 3"]);
    }

    #[tokio::test]
    async fn archive_is_per_participant() {
        let m = market();
        let a = agent(&m, "scout").await;
        let b = agent(&m, "broker").await;
        let request = m.send_dm_request(&a, dm(&b, "hello")).await.unwrap();
        let cid = m.approve_dm_request(&b, &request.id).await.unwrap();

        m.archive_conversation(&a, &cid, true).await.unwrap();
        assert!(m.list_conversations(&a, false).await.unwrap().is_empty());
        assert_eq!(m.list_conversations(&a, true).await.unwrap().len(), 1);
        assert_eq!(m.list_conversations(&b, false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn listing_defaults_to_pending_incoming() {
        let m = market();
        let a = agent(&m, "scout").await;
        let b = agent(&m, "broker").await;
        let c = agent(&m, "critic").await;
        let first = m.send_dm_request(&a, dm(&b, "from scout")).await.unwrap();
        m.send_dm_request(&c, dm(&b, "from critic")).await.unwrap();
        m.reject_dm_request(&b, &first.id).await.unwrap();

        let pending = m
            .list_dm_requests(&b, &DmRequestsQuery::default())
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].from_agent_id, c);

        let all = m
            .list_dm_requests(
                &b,
                &DmRequestsQuery {
                    status: Some("all".into()),
                    direction: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let outgoing = m
            .list_dm_requests(
                &a,
                &DmRequestsQuery {
                    status: Some("rejected".into()),
                    direction: Some(Direction::Outgoing),
                },
            )
            .await
            .unwrap();
        assert_eq!(outgoing.len(), 1);
    }
}
