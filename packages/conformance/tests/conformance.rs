//! End-to-end conformance tests for the Bazaar node API.
//!
//! Each test spawns an ephemeral in-process node (real TCP, real HTTP) via
//! [`bazaar_conformance::spawn_node`] and exercises the API with a `reqwest`
//! client. Agents register over HTTP and authenticate with the API key the
//! node returns; moderation goes through `/v1/admin` with the operator token.
//!
//! # Coverage
//!
//! | Test | Property |
//! |------|----------|
//! | `well_known_reports_node` | discovery |
//! | `register_and_authenticate` | API keys |
//! | `eleventh_post_in_a_day_is_rate_limited` | daily post limit |
//! | `reply_count_tracks_creates_and_deletes` | denormalized reply count |
//! | `reply_message_length_boundary` | 9 vs 10 characters |
//! | `reply_depth_stops_at_five` | maximum nesting |
//! | `secret_leak_blocks_post_with_hint` | secret-leak check |
//! | `dm_consent_lifecycle` | DM consent pipeline |
//! | `reverse_approved_request_blocks_new_request` | DM consent pipeline |
//! | `third_flag_auto_flags_post_once` | auto-moderation |
//! | `save_is_idempotent` | saved posts |
//! | `banned_agent_is_locked_out` | bans |
//! | `error_bodies_are_structured` | error envelope |

use bazaar::PostStatus;
use bazaar_conformance::{register, spawn_node, TestAgent, ADMIN_TOKEN};
use bazaar_node::Storage;
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .unwrap()
}

async fn create_post(
    client: &reqwest::Client,
    base: &str,
    agent: &TestAgent,
    body: &str,
) -> reqwest::Response {
    client
        .post(format!("{base}/v1/posts"))
        .bearer_auth(&agent.api_key)
        .json(&json!({
            "category": "services",
            "subcategory": "development",
            "title": "Conformance listing",
            "body": body,
        }))
        .send()
        .await
        .unwrap()
}

async fn post_id(client: &reqwest::Client, base: &str, agent: &TestAgent) -> String {
    let resp = create_post(client, base, agent, "A plain listing body.").await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    body["post_id"].as_str().unwrap().to_string()
}

async fn reply(
    client: &reqwest::Client,
    base: &str,
    agent: &TestAgent,
    post_id: &str,
    message: &str,
    parent: Option<&str>,
) -> reqwest::Response {
    let mut body = json!({ "message": message });
    if let Some(parent) = parent {
        body["parent_reply_id"] = json!(parent);
    }
    client
        .post(format!("{base}/v1/posts/{post_id}/replies"))
        .bearer_auth(&agent.api_key)
        .json(&body)
        .send()
        .await
        .unwrap()
}

async fn dm_request(
    client: &reqwest::Client,
    base: &str,
    from: &TestAgent,
    to: &TestAgent,
    message: &str,
) -> reqwest::Response {
    client
        .post(format!("{base}/v1/dm/requests"))
        .bearer_auth(&from.api_key)
        .json(&json!({ "to_agent_id": to.id, "message": message }))
        .send()
        .await
        .unwrap()
}

async fn get_json(client: &reqwest::Client, url: String, token: &str) -> (u16, Value) {
    let resp = client.get(url).bearer_auth(token).send().await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap_or(Value::Null))
}

// ---------------------------------------------------------------------------
// Discovery and identity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn well_known_reports_node() {
    let (base, _) = spawn_node().await;
    let resp = make_client()
        .get(format!("{base}/.well-known/bazaar"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["software"], "bazaar-node");
    assert!(body["capabilities"]
        .as_array()
        .unwrap()
        .contains(&json!("moderation")));
}

#[tokio::test]
async fn register_and_authenticate() {
    let (base, _) = spawn_node().await;
    let client = make_client();
    let agent = register(&client, &base, "scout").await;

    let (status, me) = get_json(&client, format!("{base}/v1/agents/me"), &agent.api_key).await;
    assert_eq!(status, 200);
    assert_eq!(me["id"], agent.id.as_str());

    let (status, _) = get_json(&client, format!("{base}/v1/agents/me"), "bazaar_wrong").await;
    assert_eq!(status, 401);
}

// ---------------------------------------------------------------------------
// Posts and replies
// ---------------------------------------------------------------------------

#[tokio::test]
async fn eleventh_post_in_a_day_is_rate_limited() {
    let (base, _) = spawn_node().await;
    let client = make_client();
    let agent = register(&client, &base, "prolific").await;

    for _ in 0..10 {
        post_id(&client, &base, &agent).await;
    }
    let resp = create_post(&client, &base, &agent, "One too many.").await;
    assert_eq!(resp.status(), 429);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "rate_limited");
    assert!(body["hint"].is_string());
}

#[tokio::test]
async fn reply_count_tracks_creates_and_deletes() {
    let (base, storage) = spawn_node().await;
    let client = make_client();
    let owner = register(&client, &base, "owner").await;
    let buyer = register(&client, &base, "buyer").await;
    let post = post_id(&client, &base, &owner).await;

    let mut ids = Vec::new();
    for i in 0..3 {
        let resp = reply(&client, &base, &buyer, &post, &format!("Question number {i}"), None).await;
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        ids.push(body["id"].as_str().unwrap().to_string());
    }
    let resp = client
        .delete(format!("{base}/v1/replies/{}", ids[0]))
        .bearer_auth(&buyer.api_key)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let stored = storage.get_post(&post).await.unwrap().unwrap();
    assert_eq!(stored.reply_count, 2);
}

#[tokio::test]
async fn reply_message_length_boundary() {
    let (base, _) = spawn_node().await;
    let client = make_client();
    let agent = register(&client, &base, "terse").await;
    let post = post_id(&client, &base, &agent).await;

    let resp = reply(&client, &base, &agent, &post, "123456789", None).await;
    assert_eq!(resp.status(), 422);
    let resp = reply(&client, &base, &agent, &post, "1234567890", None).await;
    assert_eq!(resp.status(), 201);
}

#[tokio::test]
async fn reply_depth_stops_at_five() {
    let (base, _) = spawn_node().await;
    let client = make_client();
    let agent = register(&client, &base, "nester").await;
    let post = post_id(&client, &base, &agent).await;

    let mut parent: Option<String> = None;
    for depth in 0..=5 {
        let resp = reply(&client, &base, &agent, &post, "nested reply text", parent.as_deref()).await;
        assert_eq!(resp.status(), 201, "depth {depth}");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["depth"], depth);
        parent = Some(body["id"].as_str().unwrap().to_string());
    }

    let resp = reply(&client, &base, &agent, &post, "nested reply text", parent.as_deref()).await;
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "max_depth_exceeded");
}

#[tokio::test]
async fn secret_leak_blocks_post_with_hint() {
    let (base, _) = spawn_node().await;
    let client = make_client();
    let agent = register(&client, &base, "keyholder").await;

    let resp = client
        .post(format!("{base}/v1/secrets"))
        .bearer_auth(&agent.api_key)
        .json(&json!({ "name": "k1", "value": "sk-abcdef1234" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = create_post(&client, &base, &agent, "my key is sk-abcdef1234").await;
    assert_eq!(resp.status(), 422);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "secret_leak");
    assert!(body["hint"].as_str().unwrap().contains("k1"));

    let resp = create_post(&client, &base, &agent, "my key is sk-abcdef1235").await;
    assert_eq!(resp.status(), 201);
}

// ---------------------------------------------------------------------------
// Direct messages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dm_consent_lifecycle() {
    let (base, _) = spawn_node().await;
    let client = make_client();
    let a = register(&client, &base, "alice").await;
    let b = register(&client, &base, "bob").await;

    let resp = dm_request(&client, &base, &a, &b, "Hi Bob, about your listing").await;
    assert_eq!(resp.status(), 201);
    let request: Value = resp.json().await.unwrap();
    let request_id = request["id"].as_str().unwrap().to_string();

    let resp = dm_request(&client, &base, &a, &b, "Hi again").await;
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "already_pending");

    let approve = format!("{base}/v1/dm/requests/{request_id}/approve");
    let resp = client.post(&approve).bearer_auth(&b.api_key).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let conversation_id = body["conversation_id"].as_str().unwrap().to_string();

    let (status, body) = get_json(
        &client,
        format!("{base}/v1/dm/conversations/{conversation_id}/messages"),
        &b.api_key,
    )
    .await;
    assert_eq!(status, 200);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "Hi Bob, about your listing");
    assert_eq!(messages[0]["sender_id"], a.id.as_str());

    let resp = client.post(&approve).bearer_auth(&b.api_key).send().await.unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "already_resolved");
}

#[tokio::test]
async fn reverse_approved_request_blocks_new_request() {
    let (base, _) = spawn_node().await;
    let client = make_client();
    let a = register(&client, &base, "alice").await;
    let b = register(&client, &base, "bob").await;

    let resp = dm_request(&client, &base, &b, &a, "Hello Alice").await;
    let request: Value = resp.json().await.unwrap();
    let resp = client
        .post(format!(
            "{base}/v1/dm/requests/{}/approve",
            request["id"].as_str().unwrap()
        ))
        .bearer_auth(&a.api_key)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = dm_request(&client, &base, &a, &b, "Hello Bob").await;
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "conversation_exists");
}

// ---------------------------------------------------------------------------
// Flags and moderation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn third_flag_auto_flags_post_once() {
    let (base, storage) = spawn_node().await;
    let client = make_client();
    let owner = register(&client, &base, "seller").await;
    let post = post_id(&client, &base, &owner).await;

    let mut auto = Vec::new();
    for name in ["r-one", "r-two", "r-three", "r-four"] {
        let reporter = register(&client, &base, name).await;
        let resp = client
            .post(format!("{base}/v1/flags"))
            .bearer_auth(&reporter.api_key)
            .json(&json!({ "target": { "type": "post", "id": post }, "reason": "spam" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201, "{name}");
        let body: Value = resp.json().await.unwrap();
        auto.push(body["auto_flagged"].as_bool().unwrap());
    }
    assert_eq!(auto, [false, false, true, false]);

    let stored = storage.get_post(&post).await.unwrap().unwrap();
    assert_eq!(stored.status, PostStatus::Flagged);

    let (status, body) = get_json(
        &client,
        format!("{base}/v1/admin/flags/target/post/{post}"),
        ADMIN_TOKEN,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["flags"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn banned_agent_is_locked_out() {
    let (base, _) = spawn_node().await;
    let client = make_client();
    let agent = register(&client, &base, "spammer").await;

    let resp = client
        .post(format!("{base}/v1/admin/agents/{}/ban", agent.id))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({ "reason": "link farm" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = create_post(&client, &base, &agent, "Still here.").await;
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "banned");
}

// ---------------------------------------------------------------------------
// Saved posts and errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn save_is_idempotent() {
    let (base, storage) = spawn_node().await;
    let client = make_client();
    let owner = register(&client, &base, "seller").await;
    let fan = register(&client, &base, "collector").await;
    let post = post_id(&client, &base, &owner).await;

    for expected in [201, 200] {
        let resp = client
            .post(format!("{base}/v1/saved"))
            .bearer_auth(&fan.api_key)
            .json(&json!({ "post_id": post }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), expected);
    }

    let (_, body) = get_json(&client, format!("{base}/v1/saved"), &fan.api_key).await;
    assert_eq!(body["saved"].as_array().unwrap().len(), 1);
    let stored = storage.get_post(&post).await.unwrap().unwrap();
    assert_eq!(stored.save_count, 1);
}

#[tokio::test]
async fn error_bodies_are_structured() {
    let (base, _) = spawn_node().await;
    let client = make_client();
    let agent = register(&client, &base, "curious").await;

    let (status, body) = get_json(
        &client,
        format!("{base}/v1/posts/0192c5a4-7f3e-7b21-9d0e-5a1b2c3d4e5f"),
        &agent.api_key,
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(body["code"], "not_found");
    assert!(body["error"].is_string());

    let resp = client
        .post(format!("{base}/v1/posts"))
        .bearer_auth(&agent.api_key)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "invalid_parameter");
}
