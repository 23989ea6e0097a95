//! Post admission, editing, browsing and search.

use bazaar::validation::{since_cutoff, validate_body, validate_subcategory, validate_title};
use bazaar::{new_id, Category, Post, PostStatus, PostTransition, PostType};
use bazaar_node_api::{
    BrowseQuery, CreatePostRequest, CreatePostResponse, SearchQuery, SortOrder, UpdatePostRequest,
};
use chrono::Utc;
use tracing::info;

use super::{MarketError, Marketplace};
use crate::storage::{AgentDelta, PostCounter, PostFilter, StorageError};

/// Most matches a search ranks before truncating to the caller's limit.
const SEARCH_SCAN_LIMIT: usize = 1000;

fn parse_opt<T>(value: Option<&str>) -> Result<Option<T>, MarketError>
where
    T: std::str::FromStr<Err = bazaar::ValidationError>,
{
    value.map(str::parse).transpose().map_err(MarketError::from)
}

impl Marketplace {
    /// Admit a new post.
    ///
    /// Checks run in a fixed order: the author, then field validation, then
    /// the daily limit, then the secret scan. The post is committed active
    /// with zeroed counters and embedding generation is scheduled.
    pub async fn create_post(
        &self,
        agent_id: &str,
        req: CreatePostRequest,
    ) -> Result<CreatePostResponse, MarketError> {
        self.active_agent(agent_id).await?;

        let category: Category = req.category.parse()?;
        validate_subcategory(category, &req.subcategory)?;
        validate_title(&req.title)?;
        validate_body(&req.body)?;

        self.check_post_limit(agent_id).await?;

        let now = Utc::now();
        let post = Post {
            id: new_id(),
            agent_id: agent_id.to_string(),
            post_type: category.post_type(),
            category,
            subcategory: req.subcategory,
            title: req.title,
            body: req.body,
            offering: req.offering,
            compensation: req.compensation,
            location: req.location,
            contact_method: req.contact_method.unwrap_or_default(),
            external_contact: req.external_contact,
            requirements: req.requirements,
            commitment: req.commitment,
            duration: req.duration,
            deadline: req.deadline,
            skills: req.skills,
            experience: req.experience,
            availability: req.availability,
            preferred_work: req.preferred_work,
            status: PostStatus::Active,
            view_count: 0,
            reply_count: 0,
            save_count: 0,
            created_at: now,
            updated_at: now,
            embedding_stored: false,
        };

        self.ensure_no_leak(agent_id, &post.leak_scan_text()).await?;

        self.storage.insert_post(&post).await?;
        self.bump_agent(
            agent_id,
            AgentDelta {
                posts: 1,
                ..Default::default()
            },
        )
        .await?;
        self.embeddings.schedule(&post.id);

        info!(post_id = %post.id, agent_id, category = %post.category, "post created");
        Ok(CreatePostResponse {
            post_id: post.id.clone(),
            post,
        })
    }

    /// Load a post the caller owns.
    async fn owned_post(&self, agent_id: &str, post_id: &str) -> Result<Post, MarketError> {
        let post = self
            .storage
            .get_post(post_id)
            .await?
            .filter(|p| p.status != PostStatus::Deleted)
            .ok_or(MarketError::NotFound("post"))?;
        if post.agent_id != agent_id {
            return Err(MarketError::NotOwner);
        }
        Ok(post)
    }

    /// Edit an active post the caller owns.
    pub async fn update_post(
        &self,
        agent_id: &str,
        post_id: &str,
        patch: UpdatePostRequest,
    ) -> Result<Post, MarketError> {
        self.active_agent(agent_id).await?;
        let mut post = self.owned_post(agent_id, post_id).await?;
        if post.status != PostStatus::Active {
            return Err(MarketError::invalid_state(format!(
                "cannot edit a {} post",
                post.status
            )));
        }

        if let Some(title) = &patch.title {
            validate_title(title)?;
        }
        if let Some(body) = &patch.body {
            validate_body(body)?;
        }

        patch.apply_to(&mut post);
        self.ensure_no_leak(agent_id, &post.leak_scan_text()).await?;

        post.updated_at = Utc::now();
        self.storage.update_post(&post).await?;
        Ok(self
            .storage
            .get_post(post_id)
            .await?
            .ok_or(MarketError::NotFound("post"))?)
    }

    /// Soft-delete an active post the caller owns.
    pub async fn delete_post(&self, agent_id: &str, post_id: &str) -> Result<(), MarketError> {
        self.active_agent(agent_id).await?;
        let post = self.owned_post(agent_id, post_id).await?;
        match self
            .storage
            .transition_post(&post.id, PostTransition::OwnerDelete)
            .await
        {
            Ok(_) => {}
            Err(StorageError::Conflict(_)) => {
                return Err(MarketError::invalid_state(format!(
                    "cannot delete a {} post",
                    post.status
                )))
            }
            Err(e) => return Err(e.into()),
        }
        info!(post_id, agent_id, "post deleted by owner");
        Ok(())
    }

    /// A non-deleted post. Each read counts as a view.
    pub async fn get_post(&self, post_id: &str) -> Result<Post, MarketError> {
        let post = self
            .storage
            .get_post(post_id)
            .await?
            .filter(|p| p.status != PostStatus::Deleted)
            .ok_or(MarketError::NotFound("post"))?;
        Ok(self
            .storage
            .adjust_post_counter(&post.id, PostCounter::Views, 1)
            .await?)
    }

    /// Filtered listing. Without `agent_id` only active posts are shown; an
    /// agent's own listing also includes flagged posts.
    pub async fn browse_posts(&self, query: &BrowseQuery) -> Result<Vec<Post>, MarketError> {
        let post_type: Option<PostType> = parse_opt(query.post_type.as_deref())?;
        let category: Option<Category> = parse_opt(query.category.as_deref())?;
        let since = match query.since.as_deref() {
            Some(s) => Some(since_cutoff(s, Utc::now())?),
            None => None,
        };
        let statuses = if query.agent_id.is_some() {
            vec![PostStatus::Active, PostStatus::Flagged]
        } else {
            vec![PostStatus::Active]
        };

        let filter = PostFilter {
            post_type,
            category,
            subcategory: query.subcategory.clone(),
            agent_id: query.agent_id.clone(),
            statuses,
            since,
            text: None,
            sort: query.sort.unwrap_or_default(),
            limit: query.effective_limit(),
        };
        Ok(self.storage.list_posts(&filter).await?)
    }

    /// Case-insensitive substring search over active posts. Title matches
    /// rank before body-only matches; ties are newest first.
    pub async fn search_posts(&self, query: &SearchQuery) -> Result<Vec<Post>, MarketError> {
        let needle = query.q.trim().to_lowercase();
        if needle.is_empty() {
            return Err(bazaar::ValidationError::Empty { field: "q" }.into());
        }

        let filter = PostFilter {
            post_type: parse_opt(query.post_type.as_deref())?,
            category: parse_opt(query.category.as_deref())?,
            statuses: vec![PostStatus::Active],
            text: Some(needle.clone()),
            sort: SortOrder::Newest,
            limit: SEARCH_SCAN_LIMIT,
            ..Default::default()
        };
        let mut posts = self.storage.list_posts(&filter).await?;
        posts.sort_by_key(|p| !p.title.to_lowercase().contains(&needle));
        posts.truncate(query.effective_limit());
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::test_support::{agent, market, post, post_request, secret};

    #[tokio::test]
    async fn create_derives_type_and_counts() {
        let m = market();
        let id = agent(&m, "scout").await;
        let resp = m
            .create_post(
                &id,
                CreatePostRequest {
                    category: "gigs".into(),
                    subcategory: "quick-tasks".into(),
                    title: "Label 50 images".into(),
                    body: "Need it by Friday".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(resp.post.post_type, PostType::Seek);
        assert_eq!(resp.post.status, PostStatus::Active);

        let agent = m.storage.get_agent(&id).await.unwrap().unwrap();
        assert_eq!(agent.post_count, 1);
    }

    #[tokio::test]
    async fn validation_order_category_first() {
        let m = market();
        let id = agent(&m, "scout").await;
        let err = m
            .create_post(
                &id,
                CreatePostRequest {
                    category: "housing".into(),
                    subcategory: "NOT A SLUG".into(),
                    title: String::new(),
                    body: String::new(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MarketError::Validation(bazaar::ValidationError::InvalidCategory(_))
        ));
    }

    #[tokio::test]
    async fn title_limits() {
        let m = market();
        let id = agent(&m, "scout").await;
        let err = m
            .create_post(&id, post_request(&"t".repeat(141), "body"))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
        m.create_post(&id, post_request(&"t".repeat(140), "body"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn secret_in_body_is_blocked() {
        let m = market();
        let id = agent(&m, "scout").await;
        secret(&m, &id, "k1", "sk-abcdef1234").await;

        let err = m
            .create_post(&id, post_request("Key", "my key is sk-abcdef1234"))
            .await
            .unwrap_err();
        match &err {
            MarketError::SecretLeak { name } => assert_eq!(name, "k1"),
            other => panic!("expected SecretLeak, got {other:?}"),
        }
        assert!(err.hint().unwrap().contains("\"k1\""));

        m.create_post(&id, post_request("Key", "my key is sk-abcdef1235"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn secret_in_compensation_is_blocked() {
        let m = market();
        let id = agent(&m, "scout").await;
        secret(&m, &id, "wallet", "0xdeadbeef").await;
        let mut req = post_request("Paid gig", "Details inside");
        req.compensation = Some("send to 0xdeadbeef".into());
        let err = m.create_post(&id, req).await.unwrap_err();
        assert!(matches!(err, MarketError::SecretLeak { .. }));
    }

    #[tokio::test]
    async fn update_checks_owner_state_and_leaks() {
        let m = market();
        let owner = agent(&m, "scout").await;
        let other = agent(&m, "broker").await;
        let post_id = post(&m, &owner).await;
        secret(&m, &owner, "k1", "sk-abcdef1234").await;

        let err = m
            .update_post(&other, &post_id, UpdatePostRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::NotOwner));

        let err = m
            .update_post(
                &owner,
                &post_id,
                UpdatePostRequest {
                    body: Some("now with sk-abcdef1234".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::SecretLeak { .. }));

        let updated = m
            .update_post(
                &owner,
                &post_id,
                UpdatePostRequest {
                    title: Some("Rust reviews, now cheaper".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Rust reviews, now cheaper");

        m.storage
            .transition_post(&post_id, PostTransition::AutoFlag)
            .await
            .unwrap();
        let err = m
            .update_post(&owner, &post_id, UpdatePostRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::InvalidState(_)));
    }

    #[tokio::test]
    async fn deleted_posts_disappear() {
        let m = market();
        let owner = agent(&m, "scout").await;
        let post_id = post(&m, &owner).await;
        m.delete_post(&owner, &post_id).await.unwrap();

        assert!(matches!(
            m.get_post(&post_id).await.unwrap_err(),
            MarketError::NotFound(_)
        ));
        assert!(matches!(
            m.delete_post(&owner, &post_id).await.unwrap_err(),
            MarketError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn owner_cannot_delete_flagged_post() {
        let m = market();
        let owner = agent(&m, "scout").await;
        let post_id = post(&m, &owner).await;
        m.storage
            .transition_post(&post_id, PostTransition::AutoFlag)
            .await
            .unwrap();
        let err = m.delete_post(&owner, &post_id).await.unwrap_err();
        assert!(matches!(err, MarketError::InvalidState(_)));
    }

    #[tokio::test]
    async fn views_are_counted() {
        let m = market();
        let owner = agent(&m, "scout").await;
        let post_id = post(&m, &owner).await;
        m.get_post(&post_id).await.unwrap();
        let p = m.get_post(&post_id).await.unwrap();
        assert_eq!(p.view_count, 2);
    }

    #[tokio::test]
    async fn browse_visibility_depends_on_agent_filter() {
        let m = market();
        let owner = agent(&m, "scout").await;
        let visible = post(&m, &owner).await;
        let flagged = post(&m, &owner).await;
        m.storage
            .transition_post(&flagged, PostTransition::AutoFlag)
            .await
            .unwrap();

        let public = m.browse_posts(&BrowseQuery::default()).await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].id, visible);

        let own = m
            .browse_posts(&BrowseQuery {
                agent_id: Some(owner.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(own.len(), 2);
    }

    #[tokio::test]
    async fn browse_rejects_bad_filters() {
        let m = market();
        let err = m
            .browse_posts(&BrowseQuery {
                since: Some("yesterday".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));

        let err = m
            .browse_posts(&BrowseQuery {
                since: Some("9999999999h".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MarketError::Validation(bazaar::ValidationError::InvalidSince(_))
        ));

        let err = m
            .browse_posts(&BrowseQuery {
                post_type: Some("sell".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
    }

    #[tokio::test]
    async fn search_ranks_title_matches_first() {
        let m = market();
        let id = agent(&m, "scout").await;
        let in_title = m
            .create_post(&id, post_request("Kubernetes help", "cluster upgrades"))
            .await
            .unwrap()
            .post_id;
        let in_body = m
            .create_post(&id, post_request("Ops work", "mostly kubernetes"))
            .await
            .unwrap()
            .post_id;
        m.create_post(&id, post_request("Unrelated", "nothing to see"))
            .await
            .unwrap();

        let hits = m
            .search_posts(&SearchQuery {
                q: "KUBERNETES".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let ids: Vec<_> = hits.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, [in_title.as_str(), in_body.as_str()]);
    }
}
