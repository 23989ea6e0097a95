//! Detached embedding generation for new posts.
//!
//! Post creation hands the new post's id to [`EmbeddingDispatcher::schedule`],
//! which spawns a task and returns immediately. The task loads the post,
//! embeds `"{title}\n\n{body}"` through an [`Embedder`], and stores the
//! vector. Failures are logged at `warn` and never reach the caller of the
//! write that triggered them.
//!
//! Without an API key the dispatcher is disabled and scheduling does nothing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bazaar::PostEmbedding;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EmbeddingConfig;
use crate::storage::{Storage, StorageError};

/// Longest input, in characters, sent to the embeddings API.
pub const MAX_INPUT_CHARS: usize = 8000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A client with `timeout`, or the default client when the builder fails.
fn http_client(timeout: Duration) -> Client {
    Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        warn!("embeddings HTTP client setup failed, continuing without a timeout: {e}");
        Client::new()
    })
}

// ---------------------------------------------------------------------------
// EmbeddingError
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embeddings API returned status {0}")]
    BadStatus(u16),

    #[error("embeddings API returned no vector")]
    Empty,

    #[error("post {0} no longer exists")]
    PostGone(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

// ---------------------------------------------------------------------------
// Embedder
// ---------------------------------------------------------------------------

/// Turns text into a vector.
#[async_trait]
pub trait Embedder: Send + Sync + 'static {
    /// Model name recorded next to each stored vector.
    fn model(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Client for OpenAI-compatible `POST /v1/embeddings` endpoints.
pub struct OpenAiEmbedder {
    client: Client,
    url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(client: Client, url: String, api_key: String, model: String) -> Self {
        Self {
            client,
            url,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(EmbeddingError::BadStatus(resp.status().as_u16()));
        }

        let body: EmbeddingResponse = resp.json().await?;
        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(EmbeddingError::Empty)
    }
}

// ---------------------------------------------------------------------------
// EmbeddingDispatcher
// ---------------------------------------------------------------------------

/// Schedules embedding work off the request path.
#[derive(Clone)]
pub struct EmbeddingDispatcher {
    embedder: Option<Arc<dyn Embedder>>,
    storage: Arc<dyn Storage>,
}

impl EmbeddingDispatcher {
    pub fn new(storage: Arc<dyn Storage>, embedder: Option<Arc<dyn Embedder>>) -> Self {
        Self { embedder, storage }
    }

    /// A dispatcher whose `schedule` is a no-op.
    pub fn disabled(storage: Arc<dyn Storage>) -> Self {
        Self::new(storage, None)
    }

    /// Build from config; disabled when no API key is set.
    pub fn from_config(config: &EmbeddingConfig, storage: Arc<dyn Storage>) -> Self {
        let Some(api_key) = config.api_key.clone() else {
            info!("no embeddings API key configured; post embeddings disabled");
            return Self::disabled(storage);
        };
        let client = http_client(REQUEST_TIMEOUT);
        let embedder = OpenAiEmbedder::new(client, config.url.clone(), api_key, config.model.clone());
        Self::new(storage, Some(Arc::new(embedder)))
    }

    pub fn is_enabled(&self) -> bool {
        self.embedder.is_some()
    }

    /// Spawn embedding generation for `post_id`. Returns the task handle, or
    /// `None` when the dispatcher is disabled. Callers on the write path drop
    /// the handle.
    pub fn schedule(&self, post_id: &str) -> Option<JoinHandle<()>> {
        let Some(embedder) = self.embedder.clone() else {
            debug!(post_id, "embeddings disabled; skipping");
            return None;
        };
        let storage = Arc::clone(&self.storage);
        let post_id = post_id.to_string();
        Some(tokio::spawn(async move {
            match embed_post(storage.as_ref(), embedder.as_ref(), &post_id).await {
                Ok(()) => debug!(post_id, "stored post embedding"),
                Err(e) => warn!(post_id, "embedding generation failed: {e}"),
            }
        }))
    }
}

/// Text sent to the embedder for a post.
pub fn embedding_input(title: &str, body: &str) -> String {
    format!("{title}\n\n{body}")
        .chars()
        .take(MAX_INPUT_CHARS)
        .collect()
}

async fn embed_post(
    storage: &dyn Storage,
    embedder: &dyn Embedder,
    post_id: &str,
) -> Result<(), EmbeddingError> {
    let post = storage
        .get_post(post_id)
        .await?
        .ok_or_else(|| EmbeddingError::PostGone(post_id.to_string()))?;
    let vector = embedder
        .embed(&embedding_input(&post.title, &post.body))
        .await?;
    storage
        .put_embedding(&PostEmbedding {
            post_id: post.id,
            model: embedder.model().to_string(),
            vector,
            created_at: Utc::now(),
        })
        .await?;
    Ok(())
}
