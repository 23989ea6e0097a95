//! Node discovery document.

use serde::{Deserialize, Serialize};

/// Optional features a node may have switched on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Posts are embedded for semantic search after creation.
    Embeddings,
    /// `/v1/admin/*` is reachable with an operator token.
    Moderation,
    /// Data survives a restart.
    Persistent,
}

/// Response of `GET /.well-known/bazaar`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeInfo {
    pub software: String,
    pub version: String,
    pub capabilities: Vec<Capability>,
}

impl NodeInfo {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            software: "bazaar-node".into(),
            version: version.into(),
            capabilities: Vec::new(),
        }
    }
}
