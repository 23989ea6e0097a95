//! Node configuration, populated from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

/// Runtime configuration for a Bazaar node.
///
/// All fields are populated from environment variables with sensible
/// defaults, so a node can be started with zero configuration.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `BAZAAR_BIND` | `0.0.0.0:3000` | TCP socket address to listen on |
/// | `BAZAAR_DB` | (absent = in-memory) | Path to the SQLite database file |
/// | `BAZAAR_ADMIN_TOKEN` | (absent = admin API disabled) | Bearer token for `/v1/admin/*` |
/// | `BAZAAR_RATE_LIMIT_PER_MINUTE` | `120` | Per-client HTTP request cap; `0` disables |
/// | `BAZAAR_EMBEDDING_URL` | OpenAI embeddings endpoint | Embeddings API URL |
/// | `BAZAAR_EMBEDDING_API_KEY` | (absent = embeddings disabled) | Embeddings API key |
/// | `BAZAAR_EMBEDDING_MODEL` | `text-embedding-3-small` | Embedding model name |
/// | `BAZAAR_CLEANUP_INTERVAL_SECS` | `3600` | Seconds between notification cleanup rounds |
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Socket address the server binds to.
    pub bind_addr: SocketAddr,

    /// Path to the SQLite database file.
    /// `None` means use an in-memory store (data is lost on restart).
    pub db_path: Option<String>,

    /// Operator token for the moderation endpoints.
    pub admin_token: Option<String>,

    /// Maximum HTTP requests per client per minute. `0` disables the limiter.
    pub rate_limit_per_minute: u32,

    pub embedding: EmbeddingConfig,

    /// How many seconds to wait between notification cleanup rounds.
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: "https://api.openai.com/v1/embeddings".into(),
            api_key: None,
            model: "text-embedding-3-small".into(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            db_path: None,
            admin_token: None,
            rate_limit_per_minute: 120,
            embedding: EmbeddingConfig::default(),
            cleanup_interval_secs: 3600,
        }
    }
}

impl NodeConfig {
    /// Populate config from environment variables, applying defaults where absent.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr: SocketAddr = std::env::var("BAZAAR_BIND")
            .unwrap_or_else(|_| "0.0.0.0:3000".into())
            .parse()
            .expect("BAZAAR_BIND must be a valid socket address (e.g. 0.0.0.0:3000)");

        let rate_limit_per_minute = std::env::var("BAZAAR_RATE_LIMIT_PER_MINUTE")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.rate_limit_per_minute);

        let cleanup_interval_secs = std::env::var("BAZAAR_CLEANUP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(defaults.cleanup_interval_secs);

        let embedding = EmbeddingConfig {
            url: std::env::var("BAZAAR_EMBEDDING_URL").unwrap_or(defaults.embedding.url),
            api_key: std::env::var("BAZAAR_EMBEDDING_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            model: std::env::var("BAZAAR_EMBEDDING_MODEL").unwrap_or(defaults.embedding.model),
        };

        Self {
            bind_addr,
            db_path: std::env::var("BAZAAR_DB").ok(),
            admin_token: std::env::var("BAZAAR_ADMIN_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            rate_limit_per_minute,
            embedding,
            cleanup_interval_secs,
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// Limits enforced by the moderation pipeline.
///
/// These are part of the marketplace contract and are not read from the
/// environment. Tests construct tighter policies directly.
#[derive(Debug, Clone)]
pub struct Policy {
    pub posts_per_day: usize,
    pub dm_requests_per_day: usize,
    pub flag_cooldown: chrono::Duration,
    pub auto_flag_threshold: usize,
    pub max_reply_depth: u32,
    pub max_secrets: usize,
    /// Read notifications older than this are removed by cleanup.
    pub notification_retention: chrono::Duration,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            posts_per_day: 10,
            dm_requests_per_day: 20,
            flag_cooldown: chrono::Duration::seconds(60),
            auto_flag_threshold: 3,
            max_reply_depth: 5,
            max_secrets: 50,
            notification_retention: chrono::Duration::days(30),
        }
    }
}
