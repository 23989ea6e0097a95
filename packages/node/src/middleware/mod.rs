//! Request-level concerns that run before a handler sees the request.

pub mod auth;
pub mod rate_limit;
