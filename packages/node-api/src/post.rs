//! Post creation, editing, browsing and search types.

use bazaar::{Availability, ContactMethod, Experience, Offering, Post};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Create / update
// ---------------------------------------------------------------------------

/// Body of `POST /v1/posts`.
///
/// `category` is taken as a plain string so an unknown value produces a
/// hinted validation error rather than a deserialization failure. The post
/// type is derived from the category.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatePostRequest {
    pub category: String,
    pub subcategory: String,
    pub title: String,
    pub body: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offering: Option<Offering>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compensation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_method: Option<ContactMethod>,
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
}

/// Body of `PATCH /v1/posts/{id}`. Absent fields are left unchanged.
///
/// Category, subcategory, contact method and external contact are fixed at
/// creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdatePostRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compensation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
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
}

impl UpdatePostRequest {
    /// Apply the present fields to `post`.
    pub fn apply_to(self, post: &mut Post) {
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(v) = self.$field { post.$field = v; })*
            };
        }
        macro_rules! set_opt {
            ($($field:ident),*) => {
                $(if let Some(v) = self.$field { post.$field = Some(v); })*
            };
        }
        set!(title, body);
        set_opt!(
            compensation,
            location,
            requirements,
            commitment,
            duration,
            deadline,
            skills,
            experience,
            availability,
            preferred_work
        );
    }
}

/// Response of `POST /v1/posts`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatePostResponse {
    pub post_id: String,
    pub post: Post,
}

// ---------------------------------------------------------------------------
// Browse / search
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    MostReplies,
}

/// Query parameters for `GET /v1/posts`.
///
/// String filters are parsed by the node so a bad value yields a hinted
/// `validation_failed` error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrowseQuery {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub post_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Relative window: `24h`, `7d`, `2w`, `1m`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl BrowseQuery {
    /// Effective limit, clamped to [1, 100]. Returns 25 if not specified.
    pub fn effective_limit(&self) -> usize {
        effective_limit(self.limit)
    }
}

/// Query parameters for `GET /v1/posts/search`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub post_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl SearchQuery {
    pub fn effective_limit(&self) -> usize {
        effective_limit(self.limit)
    }
}

fn effective_limit(limit: Option<u32>) -> usize {
    limit.map(|l| l.clamp(1, 100)).unwrap_or(25) as usize
}

/// A page of posts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostsResponse {
    pub posts: Vec<Post>,
    pub count: usize,
}

impl PostsResponse {
    pub fn new(posts: Vec<Post>) -> Self {
        Self {
            count: posts.len(),
            posts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(BrowseQuery::default().effective_limit(), 25);
        let q = BrowseQuery {
            limit: Some(500),
            ..Default::default()
        };
        assert_eq!(q.effective_limit(), 100);
        let q = BrowseQuery {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(q.effective_limit(), 1);
    }

    #[test]
    fn sort_is_kebab_case() {
        let s: SortOrder = serde_json::from_str("\"most-replies\"").unwrap();
        assert_eq!(s, SortOrder::MostReplies);
    }

    #[test]
    fn create_request_accepts_minimal_body() {
        let req: CreatePostRequest = serde_json::from_str(
            r#"{"category":"gigs","subcategory":"quick-tasks","title":"Label 50 images","body":"Need it by Friday"}"#,
        )
        .unwrap();
        assert!(req.contact_method.is_none());
        assert!(req.skills.is_none());
    }
}
