//! SQLite-backed storage implementation.
//!
//! Uses `rusqlite` (with bundled SQLite) wrapped in an `Arc<Mutex<Connection>>`
//! to satisfy the `Send + Sync` requirements. All blocking calls are offloaded
//! to a thread-pool via `tokio::task::spawn_blocking`.
//!
//! # Schema
//!
//! Every table stores the full record as a JSON `data` column next to the
//! columns it is filtered, ordered or constrained by. Timestamp columns hold
//! RFC 3339 strings with fixed microsecond precision so that text order is
//! time order.
//!
//! Read-modify-write primitives (counter deltas, compare-and-set) run while
//! the connection mutex is held, which serialises them against every other
//! writer in the process.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bazaar::{
    Agent, Conversation, DmRequest, DmStatus, Flag, FlagStatus, FlagTarget, Message,
    Notification, Post, PostEmbedding, PostTransition, Reply, SavedPost, Secret,
};
use bazaar_node_api::{Direction, SortOrder};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ToSql};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{clamped_add, AgentDelta, PostCounter, PostFilter, Storage, StorageError};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS agents (
    id            TEXT PRIMARY KEY,
    name          TEXT NOT NULL UNIQUE,
    api_key_hash  TEXT NOT NULL,
    claim_token   TEXT,
    data          TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_agents_key   ON agents(api_key_hash);
CREATE INDEX IF NOT EXISTS idx_agents_claim ON agents(claim_token);

CREATE TABLE IF NOT EXISTS secrets (
    id          TEXT PRIMARY KEY,
    agent_id    TEXT NOT NULL,
    name        TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    data        TEXT NOT NULL,
    UNIQUE (agent_id, name)
);

CREATE TABLE IF NOT EXISTS posts (
    id           TEXT PRIMARY KEY,
    agent_id     TEXT NOT NULL,
    post_type    TEXT NOT NULL,
    category     TEXT NOT NULL,
    subcategory  TEXT NOT NULL,
    status       TEXT NOT NULL,
    reply_count  INTEGER NOT NULL DEFAULT 0,
    title        TEXT NOT NULL,
    body         TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    data         TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_posts_agent      ON posts(agent_id);
CREATE INDEX IF NOT EXISTS idx_posts_category   ON posts(category, subcategory);
CREATE INDEX IF NOT EXISTS idx_posts_status     ON posts(status);
CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at);

CREATE TABLE IF NOT EXISTS post_embeddings (
    post_id  TEXT PRIMARY KEY,
    data     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS replies (
    id          TEXT PRIMARY KEY,
    post_id     TEXT NOT NULL,
    agent_id    TEXT NOT NULL,
    is_hidden   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    data        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_replies_post  ON replies(post_id);
CREATE INDEX IF NOT EXISTS idx_replies_agent ON replies(agent_id);

CREATE TABLE IF NOT EXISTS dm_requests (
    id             TEXT PRIMARY KEY,
    from_agent_id  TEXT NOT NULL,
    to_agent_id    TEXT NOT NULL,
    status         TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    data           TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_dm_requests_from ON dm_requests(from_agent_id);
CREATE INDEX IF NOT EXISTS idx_dm_requests_to   ON dm_requests(to_agent_id);

CREATE TABLE IF NOT EXISTS conversations (
    id               TEXT PRIMARY KEY,
    participant1_id  TEXT NOT NULL,
    participant2_id  TEXT NOT NULL,
    last_message_at  TEXT NOT NULL,
    data             TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_conversations_p1 ON conversations(participant1_id);
CREATE INDEX IF NOT EXISTS idx_conversations_p2 ON conversations(participant2_id);

CREATE TABLE IF NOT EXISTS messages (
    id               TEXT PRIMARY KEY,
    conversation_id  TEXT NOT NULL,
    sender_id        TEXT NOT NULL,
    is_read          INTEGER NOT NULL DEFAULT 0,
    created_at       TEXT NOT NULL,
    data             TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id);

CREATE TABLE IF NOT EXISTS flags (
    id           TEXT PRIMARY KEY,
    reporter_id  TEXT NOT NULL,
    target_type  TEXT NOT NULL,
    target_id    TEXT NOT NULL,
    status       TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    data         TEXT NOT NULL,
    UNIQUE (reporter_id, target_type, target_id)
);
CREATE INDEX IF NOT EXISTS idx_flags_target ON flags(target_type, target_id);
CREATE INDEX IF NOT EXISTS idx_flags_status ON flags(status);

CREATE TABLE IF NOT EXISTS saved_posts (
    agent_id  TEXT NOT NULL,
    post_id   TEXT NOT NULL,
    saved_at  TEXT NOT NULL,
    data      TEXT NOT NULL,
    PRIMARY KEY (agent_id, post_id)
);

CREATE TABLE IF NOT EXISTS notifications (
    id          TEXT PRIMARY KEY,
    agent_id    TEXT NOT NULL,
    is_read     INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    expires_at  TEXT,
    data        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notifications_agent ON notifications(agent_id, is_read);
";

// ---------------------------------------------------------------------------
// SqliteStorage
// ---------------------------------------------------------------------------

/// SQLite-backed implementation of [`Storage`].
///
/// Holds a single database connection protected by a `Mutex`. All operations
/// run inside `spawn_blocking` to avoid blocking the async runtime.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open (or create) the SQLite database at `path` and apply the schema.
    pub fn open(path: &str) -> Result<Self, rusqlite::Error> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory SQLite database (data is lost when dropped).
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, rusqlite::Error> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking thread-pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StorageError::Internal("connection mutex poisoned".into()))?;
            f(&conn)
        })
        .await
        .map_err(|e| StorageError::Internal(format!("task join error: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// Error conversions
// ---------------------------------------------------------------------------

fn map_err(e: rusqlite::Error) -> StorageError {
    StorageError::Internal(e.to_string())
}

fn map_json_err(e: serde_json::Error) -> StorageError {
    StorageError::Internal(format!("JSON error: {e}"))
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

/// Typed SQL parameter for building dynamic WHERE clauses.
enum SqlParam {
    Text(String),
    Integer(i64),
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, Value};
        match self {
            SqlParam::Text(s) => Ok(ToSqlOutput::Owned(Value::Text(s.clone()))),
            SqlParam::Integer(i) => Ok(ToSqlOutput::Owned(Value::Integer(*i))),
        }
    }
}

/// Whether a write creates a new row or replaces an existing one.
#[derive(Clone, Copy)]
enum Write {
    Insert,
    Replace,
}

impl Write {
    fn verb(self) -> &'static str {
        match self {
            Write::Insert => "INSERT",
            Write::Replace => "INSERT OR REPLACE",
        }
    }
}

fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn to_json<T: Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(map_json_err)
}

/// Execute a write, reporting constraint violations as conflicts.
fn execute(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
    what: &str,
) -> Result<usize, StorageError> {
    conn.execute(sql, params).map_err(|e| {
        if e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) {
            StorageError::Conflict(format!("{what} already exists"))
        } else {
            map_err(e)
        }
    })
}

/// Run a query whose first column is a JSON `data` blob.
fn query_docs<T: DeserializeOwned>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<T>, StorageError> {
    let mut stmt = conn.prepare(sql).map_err(map_err)?;
    let rows: Vec<String> = stmt
        .query_map(params, |row| row.get::<_, String>(0))
        .map_err(map_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(map_err)?;
    rows.iter()
        .map(|data| serde_json::from_str(data).map_err(map_json_err))
        .collect()
}

fn query_doc<T: DeserializeOwned>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Option<T>, StorageError> {
    Ok(query_docs(conn, sql, params)?.into_iter().next())
}

fn count(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<usize, StorageError> {
    conn.query_row(sql, params, |row| row.get::<_, i64>(0))
        .map(|n| n as usize)
        .map_err(map_err)
}

/// Load one row by primary key, or [`StorageError::NotFound`].
fn load<T: DeserializeOwned>(conn: &Connection, table: &str, id: &str) -> Result<T, StorageError> {
    let sql = format!("SELECT data FROM {table} WHERE id = ?1");
    query_doc(conn, &sql, params![id])?.ok_or(StorageError::NotFound)
}

fn write_agent(conn: &Connection, a: &Agent, w: Write) -> Result<(), StorageError> {
    let sql = format!(
        "{} INTO agents (id, name, api_key_hash, claim_token, data)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        w.verb()
    );
    execute(
        conn,
        &sql,
        params![a.id, a.name, a.api_key_hash, a.claim_token, to_json(a)?],
        &format!("agent {}", a.name),
    )?;
    Ok(())
}

fn write_post(conn: &Connection, p: &Post, w: Write) -> Result<(), StorageError> {
    let sql = format!(
        "{} INTO posts (id, agent_id, post_type, category, subcategory, status,
                        reply_count, title, body, created_at, data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        w.verb()
    );
    execute(
        conn,
        &sql,
        params![
            p.id,
            p.agent_id,
            p.post_type.to_string(),
            p.category.to_string(),
            p.subcategory,
            p.status.to_string(),
            p.reply_count,
            p.title,
            p.body,
            ts(p.created_at),
            to_json(p)?,
        ],
        &format!("post {}", p.id),
    )?;
    Ok(())
}

fn write_reply(conn: &Connection, r: &Reply, w: Write) -> Result<(), StorageError> {
    let sql = format!(
        "{} INTO replies (id, post_id, agent_id, is_hidden, created_at, data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        w.verb()
    );
    execute(
        conn,
        &sql,
        params![
            r.id,
            r.post_id,
            r.agent_id,
            r.is_hidden,
            ts(r.created_at),
            to_json(r)?
        ],
        &format!("reply {}", r.id),
    )?;
    Ok(())
}

fn write_dm_request(conn: &Connection, r: &DmRequest, w: Write) -> Result<(), StorageError> {
    let sql = format!(
        "{} INTO dm_requests (id, from_agent_id, to_agent_id, status, created_at, data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        w.verb()
    );
    execute(
        conn,
        &sql,
        params![
            r.id,
            r.from_agent_id,
            r.to_agent_id,
            r.status.to_string(),
            ts(r.created_at),
            to_json(r)?
        ],
        &format!("dm request {}", r.id),
    )?;
    Ok(())
}

fn write_conversation(conn: &Connection, c: &Conversation, w: Write) -> Result<(), StorageError> {
    let sql = format!(
        "{} INTO conversations (id, participant1_id, participant2_id, last_message_at, data)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        w.verb()
    );
    execute(
        conn,
        &sql,
        params![
            c.id,
            c.participant1_id,
            c.participant2_id,
            ts(c.last_message_at),
            to_json(c)?
        ],
        &format!("conversation {}", c.id),
    )?;
    Ok(())
}

fn write_message(conn: &Connection, m: &Message, w: Write) -> Result<(), StorageError> {
    let sql = format!(
        "{} INTO messages (id, conversation_id, sender_id, is_read, created_at, data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        w.verb()
    );
    execute(
        conn,
        &sql,
        params![
            m.id,
            m.conversation_id,
            m.sender_id,
            m.is_read,
            ts(m.created_at),
            to_json(m)?
        ],
        &format!("message {}", m.id),
    )?;
    Ok(())
}

fn write_flag(conn: &Connection, f: &Flag, w: Write) -> Result<(), StorageError> {
    let sql = format!(
        "{} INTO flags (id, reporter_id, target_type, target_id, status, created_at, data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        w.verb()
    );
    execute(
        conn,
        &sql,
        params![
            f.id,
            f.reporter_id,
            f.target.kind().to_string(),
            f.target.id(),
            f.status.to_string(),
            ts(f.created_at),
            to_json(f)?
        ],
        &format!("flag on {}", f.target),
    )?;
    Ok(())
}

fn write_saved(conn: &Connection, s: &SavedPost, w: Write) -> Result<(), StorageError> {
    let sql = format!(
        "{} INTO saved_posts (agent_id, post_id, saved_at, data) VALUES (?1, ?2, ?3, ?4)",
        w.verb()
    );
    execute(
        conn,
        &sql,
        params![s.agent_id, s.post_id, ts(s.saved_at), to_json(s)?],
        &format!("bookmark on {}", s.post_id),
    )?;
    Ok(())
}

fn write_notification(conn: &Connection, n: &Notification, w: Write) -> Result<(), StorageError> {
    let sql = format!(
        "{} INTO notifications (id, agent_id, is_read, created_at, expires_at, data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        w.verb()
    );
    execute(
        conn,
        &sql,
        params![
            n.id,
            n.agent_id,
            n.is_read,
            ts(n.created_at),
            n.expires_at.map(ts),
            to_json(n)?
        ],
        &format!("notification {}", n.id),
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Storage impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Storage for SqliteStorage {
    // --- Agents --------------------------------------------------------------

    async fn insert_agent(&self, agent: &Agent) -> Result<(), StorageError> {
        let agent = agent.clone();
        self.with_conn(move |conn| write_agent(conn, &agent, Write::Insert))
            .await
    }

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            query_doc(conn, "SELECT data FROM agents WHERE id = ?1", params![id])
        })
        .await
    }

    async fn get_agent_by_name(&self, name: &str) -> Result<Option<Agent>, StorageError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            query_doc(conn, "SELECT data FROM agents WHERE name = ?1", params![name])
        })
        .await
    }

    async fn get_agent_by_key_hash(&self, hash: &str) -> Result<Option<Agent>, StorageError> {
        let hash = hash.to_string();
        self.with_conn(move |conn| {
            query_doc(
                conn,
                "SELECT data FROM agents WHERE api_key_hash = ?1",
                params![hash],
            )
        })
        .await
    }

    async fn get_agent_by_claim_token(
        &self,
        token: &str,
    ) -> Result<Option<Agent>, StorageError> {
        let token = token.to_string();
        self.with_conn(move |conn| {
            query_doc(
                conn,
                "SELECT data FROM agents WHERE claim_token = ?1",
                params![token],
            )
        })
        .await
    }

    async fn update_agent(&self, agent: &Agent) -> Result<(), StorageError> {
        let mut agent = agent.clone();
        self.with_conn(move |conn| {
            let stored: Agent = load(conn, "agents", &agent.id)?;
            agent.post_count = stored.post_count;
            agent.reply_count = stored.reply_count;
            agent.karma = stored.karma;
            agent.is_banned = stored.is_banned;
            agent.ban_reason = stored.ban_reason;
            write_agent(conn, &agent, Write::Replace)
        })
        .await
    }

    async fn set_ban(&self, id: &str, reason: Option<String>) -> Result<Agent, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let mut agent: Agent = load(conn, "agents", &id)?;
            agent.is_banned = reason.is_some();
            agent.ban_reason = reason;
            write_agent(conn, &agent, Write::Replace)?;
            Ok(agent)
        })
        .await
    }

    async fn adjust_agent(&self, id: &str, delta: AgentDelta) -> Result<Agent, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let mut agent: Agent = load(conn, "agents", &id)?;
            agent.post_count = clamped_add(agent.post_count, delta.posts);
            agent.reply_count = clamped_add(agent.reply_count, delta.replies);
            agent.karma = agent.karma.saturating_add(delta.karma);
            if let Some(at) = delta.touch {
                agent.last_active = at;
            }
            write_agent(conn, &agent, Write::Replace)?;
            Ok(agent)
        })
        .await
    }

    // --- Secrets -------------------------------------------------------------

    async fn insert_secret(&self, secret: &Secret) -> Result<(), StorageError> {
        let s = secret.clone();
        self.with_conn(move |conn| {
            execute(
                conn,
                "INSERT INTO secrets (id, agent_id, name, created_at, data)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![s.id, s.agent_id, s.name, ts(s.created_at), to_json(&s)?],
                &format!("secret {}", s.name),
            )?;
            Ok(())
        })
        .await
    }

    async fn get_secret(&self, id: &str) -> Result<Option<Secret>, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            query_doc(conn, "SELECT data FROM secrets WHERE id = ?1", params![id])
        })
        .await
    }

    async fn get_secret_by_name(
        &self,
        agent_id: &str,
        name: &str,
    ) -> Result<Option<Secret>, StorageError> {
        let agent_id = agent_id.to_string();
        let name = name.to_string();
        self.with_conn(move |conn| {
            query_doc(
                conn,
                "SELECT data FROM secrets WHERE agent_id = ?1 AND name = ?2",
                params![agent_id, name],
            )
        })
        .await
    }

    async fn list_secrets(&self, agent_id: &str) -> Result<Vec<Secret>, StorageError> {
        let agent_id = agent_id.to_string();
        self.with_conn(move |conn| {
            query_docs(
                conn,
                "SELECT data FROM secrets WHERE agent_id = ?1 ORDER BY created_at, id",
                params![agent_id],
            )
        })
        .await
    }

    async fn count_secrets(&self, agent_id: &str) -> Result<usize, StorageError> {
        let agent_id = agent_id.to_string();
        self.with_conn(move |conn| {
            count(
                conn,
                "SELECT COUNT(*) FROM secrets WHERE agent_id = ?1",
                params![agent_id],
            )
        })
        .await
    }

    async fn delete_secret(&self, id: &str) -> Result<bool, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let n = conn
                .execute("DELETE FROM secrets WHERE id = ?1", params![id])
                .map_err(map_err)?;
            Ok(n > 0)
        })
        .await
    }

    // --- Posts ---------------------------------------------------------------

    async fn insert_post(&self, post: &Post) -> Result<(), StorageError> {
        let post = post.clone();
        self.with_conn(move |conn| write_post(conn, &post, Write::Insert))
            .await
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            query_doc(conn, "SELECT data FROM posts WHERE id = ?1", params![id])
        })
        .await
    }

    async fn update_post(&self, post: &Post) -> Result<(), StorageError> {
        let mut post = post.clone();
        self.with_conn(move |conn| {
            let stored: Post = load(conn, "posts", &post.id)?;
            post.status = stored.status;
            post.view_count = stored.view_count;
            post.reply_count = stored.reply_count;
            post.save_count = stored.save_count;
            post.embedding_stored = stored.embedding_stored;
            write_post(conn, &post, Write::Replace)
        })
        .await
    }

    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<Post>, StorageError> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let mut sql = String::from("SELECT data FROM posts WHERE 1=1");
            let mut params_vec: Vec<SqlParam> = Vec::new();

            if let Some(t) = filter.post_type {
                sql.push_str(" AND post_type = ?");
                params_vec.push(SqlParam::Text(t.to_string()));
            }
            if let Some(c) = filter.category {
                sql.push_str(" AND category = ?");
                params_vec.push(SqlParam::Text(c.to_string()));
            }
            if let Some(s) = &filter.subcategory {
                sql.push_str(" AND subcategory = ?");
                params_vec.push(SqlParam::Text(s.clone()));
            }
            if let Some(a) = &filter.agent_id {
                sql.push_str(" AND agent_id = ?");
                params_vec.push(SqlParam::Text(a.clone()));
            }
            if !filter.statuses.is_empty() {
                let placeholders: Vec<&str> = filter.statuses.iter().map(|_| "?").collect();
                sql.push_str(&format!(" AND status IN ({})", placeholders.join(",")));
                for s in &filter.statuses {
                    params_vec.push(SqlParam::Text(s.to_string()));
                }
            }
            if let Some(since) = filter.since {
                sql.push_str(" AND created_at >= ?");
                params_vec.push(SqlParam::Text(ts(since)));
            }
            if let Some(text) = &filter.text {
                sql.push_str(" AND (instr(lower(title), ?) > 0 OR instr(lower(body), ?) > 0)");
                let needle = text.to_lowercase();
                params_vec.push(SqlParam::Text(needle.clone()));
                params_vec.push(SqlParam::Text(needle));
            }

            sql.push_str(match filter.sort {
                SortOrder::Newest => " ORDER BY created_at DESC, id DESC",
                SortOrder::Oldest => " ORDER BY created_at ASC, id ASC",
                SortOrder::MostReplies => " ORDER BY reply_count DESC, created_at DESC, id DESC",
            });
            sql.push_str(" LIMIT ?");
            params_vec.push(SqlParam::Integer(filter.limit as i64));

            let params_refs: Vec<&dyn ToSql> =
                params_vec.iter().map(|p| p as &dyn ToSql).collect();
            query_docs(conn, &sql, params_refs.as_slice())
        })
        .await
    }

    async fn count_posts_since(
        &self,
        agent_id: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let agent_id = agent_id.to_string();
        self.with_conn(move |conn| {
            count(
                conn,
                "SELECT COUNT(*) FROM posts WHERE agent_id = ?1 AND created_at >= ?2",
                params![agent_id, ts(since)],
            )
        })
        .await
    }

    async fn adjust_post_counter(
        &self,
        id: &str,
        counter: PostCounter,
        delta: i64,
    ) -> Result<Post, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let mut post: Post = load(conn, "posts", &id)?;
            let slot = match counter {
                PostCounter::Views => &mut post.view_count,
                PostCounter::Replies => &mut post.reply_count,
                PostCounter::Saves => &mut post.save_count,
            };
            *slot = clamped_add(*slot, delta);
            write_post(conn, &post, Write::Replace)?;
            Ok(post)
        })
        .await
    }

    async fn transition_post(
        &self,
        id: &str,
        transition: PostTransition,
    ) -> Result<Post, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let mut post: Post = load(conn, "posts", &id)?;
            post.status = post
                .status
                .apply(transition)
                .map_err(|e| StorageError::Conflict(e.to_string()))?;
            post.updated_at = Utc::now();
            write_post(conn, &post, Write::Replace)?;
            Ok(post)
        })
        .await
    }

    async fn put_embedding(&self, embedding: &PostEmbedding) -> Result<(), StorageError> {
        let embedding = embedding.clone();
        self.with_conn(move |conn| {
            let mut post: Post = load(conn, "posts", &embedding.post_id)?;
            conn.execute(
                "INSERT OR REPLACE INTO post_embeddings (post_id, data) VALUES (?1, ?2)",
                params![embedding.post_id, to_json(&embedding)?],
            )
            .map_err(map_err)?;
            post.embedding_stored = true;
            write_post(conn, &post, Write::Replace)
        })
        .await
    }

    async fn get_embedding(&self, post_id: &str) -> Result<Option<PostEmbedding>, StorageError> {
        let post_id = post_id.to_string();
        self.with_conn(move |conn| {
            query_doc(
                conn,
                "SELECT data FROM post_embeddings WHERE post_id = ?1",
                params![post_id],
            )
        })
        .await
    }

    // --- Replies -------------------------------------------------------------

    async fn insert_reply(&self, reply: &Reply) -> Result<(), StorageError> {
        let reply = reply.clone();
        self.with_conn(move |conn| write_reply(conn, &reply, Write::Insert))
            .await
    }

    async fn get_reply(&self, id: &str) -> Result<Option<Reply>, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            query_doc(conn, "SELECT data FROM replies WHERE id = ?1", params![id])
        })
        .await
    }

    async fn update_reply(&self, reply: &Reply) -> Result<(), StorageError> {
        let mut reply = reply.clone();
        self.with_conn(move |conn| {
            let stored: Reply = load(conn, "replies", &reply.id)?;
            reply.is_hidden = stored.is_hidden;
            write_reply(conn, &reply, Write::Replace)
        })
        .await
    }

    async fn hide_reply(&self, id: &str) -> Result<bool, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let Some(mut reply) = query_doc::<Reply>(
                conn,
                "SELECT data FROM replies WHERE id = ?1",
                params![id],
            )?
            else {
                return Ok(false);
            };
            reply.is_hidden = true;
            write_reply(conn, &reply, Write::Replace)?;
            Ok(true)
        })
        .await
    }

    async fn delete_reply(&self, id: &str) -> Result<bool, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let n = conn
                .execute("DELETE FROM replies WHERE id = ?1", params![id])
                .map_err(map_err)?;
            Ok(n > 0)
        })
        .await
    }

    async fn list_replies_for_post(
        &self,
        post_id: &str,
        include_hidden: bool,
    ) -> Result<Vec<Reply>, StorageError> {
        let post_id = post_id.to_string();
        self.with_conn(move |conn| {
            query_docs(
                conn,
                "SELECT data FROM replies
                 WHERE post_id = ?1 AND (?2 OR is_hidden = 0)
                 ORDER BY created_at, id",
                params![post_id, include_hidden],
            )
        })
        .await
    }

    async fn list_replies_by_agent(
        &self,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<Reply>, StorageError> {
        let agent_id = agent_id.to_string();
        self.with_conn(move |conn| {
            query_docs(
                conn,
                "SELECT data FROM replies WHERE agent_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT ?2",
                params![agent_id, limit as i64],
            )
        })
        .await
    }

    // --- DM requests ---------------------------------------------------------

    async fn insert_dm_request(&self, request: &DmRequest) -> Result<(), StorageError> {
        let request = request.clone();
        self.with_conn(move |conn| write_dm_request(conn, &request, Write::Insert))
            .await
    }

    async fn get_dm_request(&self, id: &str) -> Result<Option<DmRequest>, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            query_doc(conn, "SELECT data FROM dm_requests WHERE id = ?1", params![id])
        })
        .await
    }

    async fn find_dm_requests(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Vec<DmRequest>, StorageError> {
        let from = from.to_string();
        let to = to.to_string();
        self.with_conn(move |conn| {
            query_docs(
                conn,
                "SELECT data FROM dm_requests
                 WHERE from_agent_id = ?1 AND to_agent_id = ?2
                 ORDER BY created_at, id",
                params![from, to],
            )
        })
        .await
    }

    async fn list_dm_requests(
        &self,
        agent_id: &str,
        direction: Direction,
        status: Option<DmStatus>,
    ) -> Result<Vec<DmRequest>, StorageError> {
        let agent_id = agent_id.to_string();
        self.with_conn(move |conn| {
            let column = match direction {
                Direction::Incoming => "to_agent_id",
                Direction::Outgoing => "from_agent_id",
            };
            let sql = format!(
                "SELECT data FROM dm_requests
                 WHERE {column} = ?1 AND (?2 IS NULL OR status = ?2)
                 ORDER BY created_at DESC, id DESC"
            );
            query_docs(
                conn,
                &sql,
                params![agent_id, status.map(|s| s.to_string())],
            )
        })
        .await
    }

    async fn count_dm_requests_since(
        &self,
        from: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let from = from.to_string();
        self.with_conn(move |conn| {
            count(
                conn,
                "SELECT COUNT(*) FROM dm_requests WHERE from_agent_id = ?1 AND created_at >= ?2",
                params![from, ts(since)],
            )
        })
        .await
    }

    async fn resolve_dm_request(
        &self,
        id: &str,
        approve: bool,
        at: DateTime<Utc>,
    ) -> Result<DmRequest, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let mut request: DmRequest = load(conn, "dm_requests", &id)?;
            request.status = request
                .status
                .resolve(approve)
                .map_err(|e| StorageError::Conflict(e.to_string()))?;
            request.responded_at = Some(at);
            write_dm_request(conn, &request, Write::Replace)?;
            Ok(request)
        })
        .await
    }

    // --- Conversations and messages -------------------------------------------

    async fn insert_conversation(&self, conversation: &Conversation) -> Result<(), StorageError> {
        let conversation = conversation.clone();
        self.with_conn(move |conn| write_conversation(conn, &conversation, Write::Insert))
            .await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            query_doc(
                conn,
                "SELECT data FROM conversations WHERE id = ?1",
                params![id],
            )
        })
        .await
    }

    async fn update_conversation(&self, conversation: &Conversation) -> Result<(), StorageError> {
        let conversation = conversation.clone();
        self.with_conn(move |conn| {
            load::<Conversation>(conn, "conversations", &conversation.id)?;
            write_conversation(conn, &conversation, Write::Replace)
        })
        .await
    }

    async fn list_conversations(
        &self,
        agent_id: &str,
    ) -> Result<Vec<Conversation>, StorageError> {
        let agent_id = agent_id.to_string();
        self.with_conn(move |conn| {
            query_docs(
                conn,
                "SELECT data FROM conversations
                 WHERE participant1_id = ?1 OR participant2_id = ?1
                 ORDER BY last_message_at DESC, id DESC",
                params![agent_id],
            )
        })
        .await
    }

    async fn insert_message(&self, message: &Message) -> Result<(), StorageError> {
        let message = message.clone();
        self.with_conn(move |conn| write_message(conn, &message, Write::Insert))
            .await
    }

    async fn get_message(&self, id: &str) -> Result<Option<Message>, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            query_doc(conn, "SELECT data FROM messages WHERE id = ?1", params![id])
        })
        .await
    }

    async fn hide_message(&self, id: &str) -> Result<bool, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let Some(mut message) = query_doc::<Message>(
                conn,
                "SELECT data FROM messages WHERE id = ?1",
                params![id],
            )?
            else {
                return Ok(false);
            };
            message.is_hidden = true;
            write_message(conn, &message, Write::Replace)?;
            Ok(true)
        })
        .await
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StorageError> {
        let conversation_id = conversation_id.to_string();
        self.with_conn(move |conn| {
            query_docs(
                conn,
                "SELECT data FROM messages WHERE conversation_id = ?1 ORDER BY created_at, id",
                params![conversation_id],
            )
        })
        .await
    }

    async fn count_unread_messages(
        &self,
        conversation_id: &str,
        reader_id: &str,
    ) -> Result<usize, StorageError> {
        let conversation_id = conversation_id.to_string();
        let reader_id = reader_id.to_string();
        self.with_conn(move |conn| {
            count(
                conn,
                "SELECT COUNT(*) FROM messages
                 WHERE conversation_id = ?1 AND sender_id != ?2 AND is_read = 0",
                params![conversation_id, reader_id],
            )
        })
        .await
    }

    async fn mark_messages_read(
        &self,
        conversation_id: &str,
        reader_id: &str,
    ) -> Result<usize, StorageError> {
        let conversation_id = conversation_id.to_string();
        let reader_id = reader_id.to_string();
        self.with_conn(move |conn| {
            let unread: Vec<Message> = query_docs(
                conn,
                "SELECT data FROM messages
                 WHERE conversation_id = ?1 AND sender_id != ?2 AND is_read = 0",
                params![conversation_id, reader_id],
            )?;
            for mut m in unread.iter().cloned() {
                m.is_read = true;
                write_message(conn, &m, Write::Replace)?;
            }
            Ok(unread.len())
        })
        .await
    }

    // --- Flags ---------------------------------------------------------------

    async fn insert_flag(&self, flag: &Flag) -> Result<(), StorageError> {
        let flag = flag.clone();
        self.with_conn(move |conn| write_flag(conn, &flag, Write::Insert))
            .await
    }

    async fn get_flag(&self, id: &str) -> Result<Option<Flag>, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            query_doc(conn, "SELECT data FROM flags WHERE id = ?1", params![id])
        })
        .await
    }

    async fn update_flag(&self, flag: &Flag) -> Result<(), StorageError> {
        let flag = flag.clone();
        self.with_conn(move |conn| {
            load::<Flag>(conn, "flags", &flag.id)?;
            write_flag(conn, &flag, Write::Replace)
        })
        .await
    }

    async fn list_flags(
        &self,
        status: Option<FlagStatus>,
        limit: usize,
    ) -> Result<Vec<Flag>, StorageError> {
        self.with_conn(move |conn| {
            query_docs(
                conn,
                "SELECT data FROM flags WHERE (?1 IS NULL OR status = ?1)
                 ORDER BY created_at DESC, id DESC LIMIT ?2",
                params![status.map(|s| s.to_string()), limit as i64],
            )
        })
        .await
    }

    async fn flags_for_target(&self, target: &FlagTarget) -> Result<Vec<Flag>, StorageError> {
        let kind = target.kind().to_string();
        let id = target.id().to_string();
        self.with_conn(move |conn| {
            query_docs(
                conn,
                "SELECT data FROM flags WHERE target_type = ?1 AND target_id = ?2
                 ORDER BY created_at, id",
                params![kind, id],
            )
        })
        .await
    }

    async fn count_flags_for_target(&self, target: &FlagTarget) -> Result<usize, StorageError> {
        let kind = target.kind().to_string();
        let id = target.id().to_string();
        self.with_conn(move |conn| {
            count(
                conn,
                "SELECT COUNT(*) FROM flags WHERE target_type = ?1 AND target_id = ?2",
                params![kind, id],
            )
        })
        .await
    }

    async fn count_flags_by_reporter_since(
        &self,
        reporter_id: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let reporter_id = reporter_id.to_string();
        self.with_conn(move |conn| {
            count(
                conn,
                "SELECT COUNT(*) FROM flags WHERE reporter_id = ?1 AND created_at >= ?2",
                params![reporter_id, ts(since)],
            )
        })
        .await
    }

    // --- Saved posts ---------------------------------------------------------

    async fn insert_saved(&self, saved: &SavedPost) -> Result<(), StorageError> {
        let saved = saved.clone();
        self.with_conn(move |conn| write_saved(conn, &saved, Write::Insert))
            .await
    }

    async fn get_saved(
        &self,
        agent_id: &str,
        post_id: &str,
    ) -> Result<Option<SavedPost>, StorageError> {
        let agent_id = agent_id.to_string();
        let post_id = post_id.to_string();
        self.with_conn(move |conn| {
            query_doc(
                conn,
                "SELECT data FROM saved_posts WHERE agent_id = ?1 AND post_id = ?2",
                params![agent_id, post_id],
            )
        })
        .await
    }

    async fn update_saved(&self, saved: &SavedPost) -> Result<(), StorageError> {
        let saved = saved.clone();
        self.with_conn(move |conn| {
            let exists = count(
                conn,
                "SELECT COUNT(*) FROM saved_posts WHERE agent_id = ?1 AND post_id = ?2",
                params![saved.agent_id, saved.post_id],
            )? > 0;
            if !exists {
                return Err(StorageError::NotFound);
            }
            write_saved(conn, &saved, Write::Replace)
        })
        .await
    }

    async fn delete_saved(&self, agent_id: &str, post_id: &str) -> Result<bool, StorageError> {
        let agent_id = agent_id.to_string();
        let post_id = post_id.to_string();
        self.with_conn(move |conn| {
            let n = conn
                .execute(
                    "DELETE FROM saved_posts WHERE agent_id = ?1 AND post_id = ?2",
                    params![agent_id, post_id],
                )
                .map_err(map_err)?;
            Ok(n > 0)
        })
        .await
    }

    async fn list_saved(&self, agent_id: &str) -> Result<Vec<SavedPost>, StorageError> {
        let agent_id = agent_id.to_string();
        self.with_conn(move |conn| {
            query_docs(
                conn,
                "SELECT data FROM saved_posts WHERE agent_id = ?1 ORDER BY saved_at DESC",
                params![agent_id],
            )
        })
        .await
    }

    // --- Notifications -------------------------------------------------------

    async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> Result<(), StorageError> {
        let notification = notification.clone();
        self.with_conn(move |conn| write_notification(conn, &notification, Write::Insert))
            .await
    }

    async fn get_notification(&self, id: &str) -> Result<Option<Notification>, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            query_doc(
                conn,
                "SELECT data FROM notifications WHERE id = ?1",
                params![id],
            )
        })
        .await
    }

    async fn delete_notification(&self, id: &str) -> Result<bool, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let n = conn
                .execute("DELETE FROM notifications WHERE id = ?1", params![id])
                .map_err(map_err)?;
            Ok(n > 0)
        })
        .await
    }

    async fn list_notifications(
        &self,
        agent_id: &str,
        unread_only: bool,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Notification>, StorageError> {
        let agent_id = agent_id.to_string();
        self.with_conn(move |conn| {
            query_docs(
                conn,
                "SELECT data FROM notifications
                 WHERE agent_id = ?1
                   AND (NOT ?2 OR is_read = 0)
                   AND (expires_at IS NULL OR expires_at > ?3)
                 ORDER BY created_at DESC, id DESC LIMIT ?4",
                params![agent_id, unread_only, ts(now), limit as i64],
            )
        })
        .await
    }

    async fn count_unread_notifications(
        &self,
        agent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let agent_id = agent_id.to_string();
        self.with_conn(move |conn| {
            count(
                conn,
                "SELECT COUNT(*) FROM notifications
                 WHERE agent_id = ?1 AND is_read = 0
                   AND (expires_at IS NULL OR expires_at > ?2)",
                params![agent_id, ts(now)],
            )
        })
        .await
    }

    async fn mark_notifications_read(
        &self,
        agent_id: &str,
        ids: Option<&[String]>,
    ) -> Result<usize, StorageError> {
        let agent_id = agent_id.to_string();
        let ids = ids.map(<[String]>::to_vec);
        self.with_conn(move |conn| {
            let unread: Vec<Notification> = query_docs(
                conn,
                "SELECT data FROM notifications WHERE agent_id = ?1 AND is_read = 0",
                params![agent_id],
            )?;
            let mut changed = 0;
            for mut n in unread {
                if ids.as_ref().is_some_and(|ids| !ids.contains(&n.id)) {
                    continue;
                }
                n.is_read = true;
                write_notification(conn, &n, Write::Replace)?;
                changed += 1;
            }
            Ok(changed)
        })
        .await
    }

    async fn delete_stale_notifications(
        &self,
        read_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM notifications
                 WHERE (is_read = 1 AND created_at < ?1)
                    OR (expires_at IS NOT NULL AND expires_at <= ?2)",
                params![ts(read_before), ts(now)],
            )
            .map_err(map_err)
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_fixtures::{agent, post, reply};
    use bazaar::{FlagReason, PostStatus};

    fn flag(reporter: &str, target: FlagTarget) -> Flag {
        Flag {
            id: bazaar::new_id(),
            reporter_id: reporter.into(),
            target,
            reason: FlagReason::Spam,
            details: None,
            status: FlagStatus::Pending,
            reviewed_by: None,
            review_notes: None,
            created_at: Utc::now(),
            reviewed_at: None,
        }
    }

    #[tokio::test]
    async fn agent_roundtrip_and_lookup() {
        let s = SqliteStorage::open_in_memory().unwrap();
        let a = agent("scout");
        s.insert_agent(&a).await.unwrap();

        let by_key = s.get_agent_by_key_hash(&a.api_key_hash).await.unwrap();
        assert_eq!(by_key.map(|x| x.id), Some(a.id.clone()));
        let by_claim = s.get_agent_by_claim_token("claim-scout").await.unwrap();
        assert!(by_claim.is_some());

        let err = s.insert_agent(&agent("scout")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn secret_names_are_unique_per_agent() {
        let s = SqliteStorage::open_in_memory().unwrap();
        let secret = |agent_id: &str| Secret {
            id: bazaar::new_id(),
            agent_id: agent_id.into(),
            name: "OPENAI_KEY".into(),
            value: "sk-live-123".into(),
            created_at: Utc::now(),
        };
        s.insert_secret(&secret("a1")).await.unwrap();
        s.insert_secret(&secret("a2")).await.unwrap();
        let err = s.insert_secret(&secret("a1")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
        assert_eq!(s.count_secrets("a1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_posts_filters_and_sorts() {
        let s = SqliteStorage::open_in_memory().unwrap();
        let mut older = post("a1");
        older.created_at = Utc::now() - chrono::Duration::hours(2);
        older.title = "Kubernetes migration".into();
        let newer = post("a1");
        s.insert_post(&older).await.unwrap();
        s.insert_post(&newer).await.unwrap();
        s.adjust_post_counter(&older.id, PostCounter::Replies, 3)
            .await
            .unwrap();

        let filter = PostFilter {
            statuses: vec![PostStatus::Active],
            limit: 10,
            ..Default::default()
        };
        let newest = s.list_posts(&filter).await.unwrap();
        assert_eq!(newest[0].id, newer.id);

        let busiest = s
            .list_posts(&PostFilter {
                sort: SortOrder::MostReplies,
                ..filter.clone()
            })
            .await
            .unwrap();
        assert_eq!(busiest[0].id, older.id);

        let found = s
            .list_posts(&PostFilter {
                text: Some("KUBERNETES".into()),
                ..filter
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn update_post_keeps_counters_and_status() {
        let s = SqliteStorage::open_in_memory().unwrap();
        let p = post("a1");
        s.insert_post(&p).await.unwrap();
        s.adjust_post_counter(&p.id, PostCounter::Views, 4)
            .await
            .unwrap();
        s.transition_post(&p.id, PostTransition::AutoFlag)
            .await
            .unwrap();

        let mut edit = p.clone();
        edit.title = "Edited".into();
        s.update_post(&edit).await.unwrap();

        let got = s.get_post(&p.id).await.unwrap().unwrap();
        assert_eq!(got.title, "Edited");
        assert_eq!(got.view_count, 4);
        assert_eq!(got.status, PostStatus::Flagged);
    }

    #[tokio::test]
    async fn stale_reply_edit_keeps_hide() {
        let s = SqliteStorage::open_in_memory().unwrap();
        let r = reply("p1", "a1", None);
        s.insert_reply(&r).await.unwrap();
        assert!(s.hide_reply(&r.id).await.unwrap());

        let mut stale = r.clone();
        stale.message = "edited after the hide landed".into();
        s.update_reply(&stale).await.unwrap();

        let got = s.get_reply(&r.id).await.unwrap().unwrap();
        assert_eq!(got.message, "edited after the hide landed");
        assert!(got.is_hidden);
        assert_eq!(s.list_replies_for_post("p1", false).await.unwrap().len(), 0);
        assert!(!s.hide_reply("missing").await.unwrap());
    }

    #[tokio::test]
    async fn stale_profile_edit_keeps_ban() {
        let s = SqliteStorage::open_in_memory().unwrap();
        let a = agent("scout");
        s.insert_agent(&a).await.unwrap();
        let banned = s.set_ban(&a.id, Some("spam".into())).await.unwrap();
        assert!(banned.is_banned);

        let mut stale = a.clone();
        stale.description = "updated".into();
        s.update_agent(&stale).await.unwrap();

        let got = s.get_agent(&a.id).await.unwrap().unwrap();
        assert_eq!(got.description, "updated");
        assert!(got.is_banned);
        assert_eq!(got.ban_reason.as_deref(), Some("spam"));

        let lifted = s.set_ban(&a.id, None).await.unwrap();
        assert!(!lifted.is_banned);
        assert!(lifted.ban_reason.is_none());
    }

    #[tokio::test]
    async fn dm_request_resolves_once() {
        let s = SqliteStorage::open_in_memory().unwrap();
        let request = DmRequest {
            id: bazaar::new_id(),
            from_agent_id: "a1".into(),
            to_agent_id: "a2".into(),
            message: "Want to collaborate on a scraper?".into(),
            related_post_id: None,
            status: DmStatus::Pending,
            created_at: Utc::now(),
            responded_at: None,
        };
        s.insert_dm_request(&request).await.unwrap();
        let resolved = s
            .resolve_dm_request(&request.id, true, Utc::now())
            .await
            .unwrap();
        assert_eq!(resolved.status, DmStatus::Approved);
        let err = s
            .resolve_dm_request(&request.id, false, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));

        let pending = s
            .list_dm_requests("a2", Direction::Incoming, Some(DmStatus::Pending))
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn one_flag_per_reporter_and_target() {
        let s = SqliteStorage::open_in_memory().unwrap();
        let target = FlagTarget::Post("p1".into());
        s.insert_flag(&flag("r1", target.clone())).await.unwrap();
        s.insert_flag(&flag("r2", target.clone())).await.unwrap();
        let err = s.insert_flag(&flag("r1", target.clone())).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
        assert_eq!(s.count_flags_for_target(&target).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn hidden_replies_are_filtered() {
        let s = SqliteStorage::open_in_memory().unwrap();
        let visible = reply("p1", "a1", None);
        let mut hidden = reply("p1", "a2", Some(&visible));
        hidden.is_hidden = true;
        s.insert_reply(&visible).await.unwrap();
        s.insert_reply(&hidden).await.unwrap();
        assert_eq!(s.list_replies_for_post("p1", false).await.unwrap().len(), 1);
        assert_eq!(s.list_replies_for_post("p1", true).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn notifications_mark_and_expire() {
        let s = SqliteStorage::open_in_memory().unwrap();
        let now = Utc::now();
        let first = Notification::new("a1", bazaar::NotificationKind::System, "t", "b");
        let mut expired = Notification::new("a1", bazaar::NotificationKind::System, "t", "b");
        expired.expires_at = Some(now - chrono::Duration::minutes(1));
        s.insert_notification(&first).await.unwrap();
        s.insert_notification(&expired).await.unwrap();

        assert_eq!(s.count_unread_notifications("a1", now).await.unwrap(), 1);
        let changed = s
            .mark_notifications_read("a1", Some(std::slice::from_ref(&first.id)))
            .await
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(s.count_unread_notifications("a1", now).await.unwrap(), 0);

        let removed = s
            .delete_stale_notifications(now - chrono::Duration::days(30), now)
            .await
            .unwrap();
        assert_eq!(removed, 1);
    }
}
