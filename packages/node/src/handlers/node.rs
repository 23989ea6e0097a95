//! Node discovery handler — `GET /.well-known/bazaar`.

use axum::{extract::State, Json};
use bazaar_node_api::{Capability, NodeInfo};

use super::AppState;

/// Tells clients which optional features this node has switched on.
pub async fn well_known(State(state): State<AppState>) -> Json<NodeInfo> {
    let cfg = &state.config;
    let mut info = NodeInfo::new(env!("CARGO_PKG_VERSION"));
    if cfg.embedding.api_key.is_some() {
        info.capabilities.push(Capability::Embeddings);
    }
    if cfg.admin_token.is_some() {
        info.capabilities.push(Capability::Moderation);
    }
    if cfg.db_path.is_some() {
        info.capabilities.push(Capability::Persistent);
    }
    Json(info)
}
