//! Bookmarks.

use bazaar::validation::validate_notes;
use bazaar::{new_id, PostStatus, SavedPost};
use bazaar_node_api::{SavePostResponse, SavedEntry};
use chrono::Utc;

use super::{MarketError, Marketplace};
use crate::storage::{PostCounter, StorageError};

impl Marketplace {
    /// Bookmark a post. Saving again only replaces the notes; `save_count`
    /// moves on the first save only.
    pub async fn save_post(
        &self,
        agent_id: &str,
        post_id: &str,
        notes: Option<String>,
    ) -> Result<SavePostResponse, MarketError> {
        self.active_agent(agent_id).await?;
        if let Some(notes) = &notes {
            validate_notes(notes)?;
        }
        self.storage
            .get_post(post_id)
            .await?
            .filter(|p| p.status != PostStatus::Deleted)
            .ok_or(MarketError::NotFound("post"))?;

        if let Some(existing) = self.storage.get_saved(agent_id, post_id).await? {
            return self.renote(existing, notes).await;
        }

        let saved = SavedPost {
            id: new_id(),
            agent_id: agent_id.to_string(),
            post_id: post_id.to_string(),
            saved_at: Utc::now(),
            notes,
        };
        match self.storage.insert_saved(&saved).await {
            Ok(()) => {}
            Err(StorageError::Conflict(_)) => {
                // Lost a race with a concurrent save of the same pair.
                let existing = self
                    .storage
                    .get_saved(agent_id, post_id)
                    .await?
                    .ok_or(MarketError::NotFound("saved post"))?;
                return self.renote(existing, saved.notes).await;
            }
            Err(e) => return Err(e.into()),
        }
        self.storage
            .adjust_post_counter(post_id, PostCounter::Saves, 1)
            .await?;

        Ok(SavePostResponse {
            saved,
            already_saved: false,
        })
    }

    async fn renote(
        &self,
        mut existing: SavedPost,
        notes: Option<String>,
    ) -> Result<SavePostResponse, MarketError> {
        if notes.is_some() {
            existing.notes = notes;
            self.storage.update_saved(&existing).await?;
        }
        Ok(SavePostResponse {
            saved: existing,
            already_saved: true,
        })
    }

    pub async fn unsave_post(&self, agent_id: &str, post_id: &str) -> Result<(), MarketError> {
        self.active_agent(agent_id).await?;
        if !self.storage.delete_saved(agent_id, post_id).await? {
            return Err(MarketError::NotFound("saved post"));
        }
        match self
            .storage
            .adjust_post_counter(post_id, PostCounter::Saves, -1)
            .await
        {
            Ok(_) | Err(StorageError::NotFound) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the notes on a bookmark; `None` clears them.
    pub async fn update_saved_notes(
        &self,
        agent_id: &str,
        post_id: &str,
        notes: Option<String>,
    ) -> Result<SavedPost, MarketError> {
        self.active_agent(agent_id).await?;
        if let Some(notes) = &notes {
            validate_notes(notes)?;
        }
        let mut saved = self
            .storage
            .get_saved(agent_id, post_id)
            .await?
            .ok_or(MarketError::NotFound("saved post"))?;
        saved.notes = notes;
        self.storage.update_saved(&saved).await?;
        Ok(saved)
    }

    /// Bookmarks with their posts, newest first. Bookmarks on deleted posts
    /// are left out.
    pub async fn list_saved(&self, agent_id: &str) -> Result<Vec<SavedEntry>, MarketError> {
        let mut entries = Vec::new();
        for saved in self.storage.list_saved(agent_id).await? {
            let Some(post) = self.storage.get_post(&saved.post_id).await? else {
                continue;
            };
            if post.status == PostStatus::Deleted {
                continue;
            }
            entries.push(SavedEntry { saved, post });
        }
        Ok(entries)
    }

    pub async fn is_saved(&self, agent_id: &str, post_id: &str) -> Result<bool, MarketError> {
        Ok(self.storage.get_saved(agent_id, post_id).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::test_support::{agent, market, post};

    #[tokio::test]
    async fn saving_twice_is_idempotent() {
        let m = market();
        let owner = agent(&m, "scout").await;
        let fan = agent(&m, "broker").await;
        let post_id = post(&m, &owner).await;

        let first = m.save_post(&fan, &post_id, None).await.unwrap();
        assert!(!first.already_saved);
        let second = m
            .save_post(&fan, &post_id, Some("call back Monday".into()))
            .await
            .unwrap();
        assert!(second.already_saved);
        assert_eq!(second.saved.id, first.saved.id);
        assert_eq!(second.saved.notes.as_deref(), Some("call back Monday"));

        assert_eq!(m.storage.list_saved(&fan).await.unwrap().len(), 1);
        let p = m.storage.get_post(&post_id).await.unwrap().unwrap();
        assert_eq!(p.save_count, 1);
    }

    #[tokio::test]
    async fn unsave_decrements_and_then_fails() {
        let m = market();
        let owner = agent(&m, "scout").await;
        let post_id = post(&m, &owner).await;
        m.save_post(&owner, &post_id, None).await.unwrap();

        m.unsave_post(&owner, &post_id).await.unwrap();
        assert!(!m.is_saved(&owner, &post_id).await.unwrap());
        let p = m.storage.get_post(&post_id).await.unwrap().unwrap();
        assert_eq!(p.save_count, 0);

        let err = m.unsave_post(&owner, &post_id).await.unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleted_posts_cannot_be_saved_and_drop_from_list() {
        let m = market();
        let owner = agent(&m, "scout").await;
        let kept = post(&m, &owner).await;
        let gone = post(&m, &owner).await;
        m.save_post(&owner, &kept, None).await.unwrap();
        m.save_post(&owner, &gone, None).await.unwrap();
        m.delete_post(&owner, &gone).await.unwrap();

        let list = m.list_saved(&owner).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].post.id, kept);

        let err = m.save_post(&owner, &gone, None).await.unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));
    }

    #[tokio::test]
    async fn notes_are_bounded_and_editable() {
        let m = market();
        let owner = agent(&m, "scout").await;
        let post_id = post(&m, &owner).await;

        let err = m
            .save_post(&owner, &post_id, Some("n".repeat(501)))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));

        m.save_post(&owner, &post_id, Some("first".into())).await.unwrap();
        let saved = m.update_saved_notes(&owner, &post_id, None).await.unwrap();
        assert!(saved.notes.is_none());
    }
}
