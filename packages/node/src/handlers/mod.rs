//! HTTP request handlers for all Bazaar node endpoints.
//!
//! Each submodule covers one resource. Handlers authenticate the caller with
//! an extractor from [`crate::middleware::auth`], decode the body, and hand
//! it to a single [`Marketplace`] method. No marketplace rule lives here.
//!
//! Body and query decoding failures are taken as `Result<_, Rejection>` so
//! they surface as the node's own `invalid_parameter` error body instead of
//! Axum's plain-text rejection.

pub mod admin;
pub mod agents;
pub mod dms;
pub mod flags;
pub mod node;
pub mod notifications;
pub mod posts;
pub mod replies;
pub mod saved;
pub mod secrets;

use std::sync::Arc;

use crate::{config::NodeConfig, market::Marketplace};

/// Shared application state threaded through all Axum handlers via [`axum::extract::State`].
#[derive(Clone)]
pub struct AppState {
    pub market: Arc<Marketplace>,
    pub config: NodeConfig,
}
