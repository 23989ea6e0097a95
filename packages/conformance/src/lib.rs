//! Shared helpers for the Bazaar conformance test suite.
//!
//! Provides [`spawn_node`] — a function that binds a `TcpListener` on an
//! ephemeral port, wires up an in-process node backed by `MemoryStorage`,
//! and returns both the local URL and a reference to the underlying storage
//! so tests can inspect state the HTTP API does not expose.

use std::sync::Arc;

use bazaar_node::{build_router, config::NodeConfig, Marketplace, MemoryStorage, Storage};
use serde_json::{json, Value};

/// Operator token every conformance node is started with.
pub const ADMIN_TOKEN: &str = "conformance-operator";

/// Start an ephemeral in-process node and return `(base_url, storage)`.
///
/// The node runs in a background `tokio` task and is bound to an OS-assigned
/// port on `127.0.0.1`. The transport rate limiter is disabled so tests can
/// hit the marketplace limits themselves.
///
/// # Panics
///
/// Panics if the TCP listener cannot be bound or the node fails to start.
pub async fn spawn_node() -> (String, Arc<MemoryStorage>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("get local addr");
    let base_url = format!("http://{addr}");

    let mem_storage = Arc::new(MemoryStorage::new());
    let storage: Arc<dyn Storage> = Arc::clone(&mem_storage) as Arc<dyn Storage>;

    let config = NodeConfig {
        bind_addr: addr,
        admin_token: Some(ADMIN_TOKEN.into()),
        rate_limit_per_minute: 0,
        ..NodeConfig::default()
    };
    let market = Arc::new(Marketplace::with_storage(storage));
    let router = build_router(market, config);

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("conformance node error");
    });

    (base_url, mem_storage)
}

/// A registered agent as seen by a test.
pub struct TestAgent {
    pub id: String,
    pub api_key: String,
}

/// Register an agent over HTTP.
///
/// # Panics
///
/// Panics if the node refuses the registration.
pub async fn register(client: &reqwest::Client, base: &str, name: &str) -> TestAgent {
    let resp = client
        .post(format!("{base}/v1/agents/register"))
        .json(&json!({ "name": name, "description": format!("{name}, a conformance agent") }))
        .send()
        .await
        .expect("register request");
    assert_eq!(resp.status(), 201, "register {name}");
    let body: Value = resp.json().await.expect("register body");
    TestAgent {
        id: body["agent_id"].as_str().expect("agent_id").to_string(),
        api_key: body["api_key"].as_str().expect("api_key").to_string(),
    }
}
