//! Per-client fixed-window HTTP rate limiting.
//!
//! Applies a configurable per-minute request cap. Authenticated requests are
//! keyed on a fingerprint of their bearer token, so agents behind one proxy
//! do not share a bucket; anonymous requests fall back to the client IP from
//! `X-Forwarded-For` → `X-Real-IP` → `"unknown"`.
//!
//! When the limit is exceeded the middleware returns HTTP 429 with a
//! `Retry-After` header whose value is the number of seconds until the
//! current window resets. A limit of `0` disables the limiter.
//!
//! This guards the transport only. The marketplace quotas (posts and DM
//! requests per day, the flag cooldown) live in [`crate::market::rate_limit`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use bazaar_node_api::error::codes;
use bazaar_node_api::ErrorResponse;

use super::auth::{bearer_token, token_fingerprint};

// ---------------------------------------------------------------------------
// RateLimiter
// ---------------------------------------------------------------------------

/// Fixed-window per-client rate limiter.
pub struct RateLimiter {
    state: RwLock<HashMap<String, Bucket>>,
    max_per_window: u32,
    window: Duration,
}

struct Bucket {
    count: u32,
    window_start: Instant,
}

impl RateLimiter {
    /// Create a new rate limiter with the given per-minute limit.
    ///
    /// Pass `0` to disable rate limiting.
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            state: RwLock::new(HashMap::new()),
            max_per_window: max_per_minute,
            window: Duration::from_secs(60),
        }
    }

    /// Returns `Err(retry_after_secs)` if `key` is over the limit.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        if self.max_per_window == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let mut state = self.state.write().unwrap_or_else(|p| p.into_inner());

        let bucket = state.entry(key.to_string()).or_insert_with(|| Bucket {
            count: 0,
            window_start: now,
        });

        let elapsed = now.duration_since(bucket.window_start);
        if elapsed >= self.window {
            bucket.count = 1;
            bucket.window_start = now;
            return Ok(());
        }

        if bucket.count >= self.max_per_window {
            let retry_after = self.window.saturating_sub(elapsed).as_secs().max(1);
            return Err(retry_after);
        }

        bucket.count += 1;
        Ok(())
    }

    /// Forget buckets whose window has ended. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.write().unwrap_or_else(|p| p.into_inner());
        let before = state.len();
        state.retain(|_, b| now.duration_since(b.window_start) < self.window);
        before - state.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.state.read().unwrap_or_else(|p| p.into_inner()).len()
    }
}

// ---------------------------------------------------------------------------
// Middleware function
// ---------------------------------------------------------------------------

/// Axum `from_fn` middleware that enforces the per-client limit.
pub async fn rate_limit_middleware(
    limiter: Arc<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(&req);

    match limiter.check(&key) {
        Ok(()) => next.run(req).await,
        Err(retry_after) => {
            let body = ErrorResponse::new(codes::RATE_LIMITED, "rate limit exceeded")
                .with_hint(Some(format!("Retry in {retry_after} seconds")));
            let mut resp = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            if let Ok(v) = HeaderValue::from_str(&retry_after.to_string()) {
                resp.headers_mut().insert("retry-after", v);
            }
            resp
        }
    }
}

// ---------------------------------------------------------------------------
// Client identification
// ---------------------------------------------------------------------------

fn client_key(req: &Request<Body>) -> String {
    if let Some(token) = bearer_token(req.headers()) {
        return format!("key:{}", token_fingerprint(token));
    }
    format!("ip:{}", extract_ip(req))
}

/// Extract the client IP from common proxy headers, falling back to `"unknown"`.
fn extract_ip(req: &Request<Body>) -> String {
    // X-Forwarded-For: client, proxy1, proxy2; the leftmost entry is the client.
    if let Some(xff) = req.headers().get("x-forwarded-for") {
        if let Ok(s) = xff.to_str() {
            if let Some(ip) = s.split(',').next().map(str::trim) {
                if !ip.is_empty() {
                    return ip.to_string();
                }
            }
        }
    }

    if let Some(xri) = req.headers().get("x-real-ip") {
        if let Ok(s) = xri.to_str() {
            if !s.is_empty() {
                return s.to_string();
            }
        }
    }

    "unknown".to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
