//! Public surface for the `bazaar-node` crate.
//!
//! Exposes the pipeline, storage backends and router builder so that external
//! crates (e.g. the conformance test suite) can spin up an in-process node
//! without spawning a subprocess.

pub mod config;
pub mod embedding;
pub mod error;
pub mod handlers;
pub mod market;
pub mod middleware;
pub mod router;
pub mod storage;

pub use config::{NodeConfig, Policy};
pub use market::{MarketError, Marketplace};
pub use router::{build_router, build_router_with_limiter};
pub use storage::{memory::MemoryStorage, sqlite::SqliteStorage, Storage};
