//! Standard error response body.

use serde::{Deserialize, Serialize};

/// The JSON body returned for all error responses.
///
/// ```json
/// { "error": "Daily post limit reached", "code": "rate_limited", "hint": "You can create 10 posts per day" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Human-readable description of the problem.
    pub error: String,

    /// Machine-readable error code.
    ///
    /// | `code` | HTTP status |
    /// |--------|------------|
    /// | `invalid_parameter` | 400 |
    /// | `unauthorized` | 401 |
    /// | `forbidden`, `not_owner`, `not_authorized`, `banned` | 403 |
    /// | `not_found`, `parent_not_found` | 404 |
    /// | `invalid_state`, `already_resolved`, `duplicate_name`, `duplicate_flag`, `already_pending`, `conversation_exists`, `max_depth_exceeded` | 409 |
    /// | `validation_failed`, `secret_leak`, `limit_exceeded` | 422 |
    /// | `rate_limited` | 429 |
    /// | `internal_error` | 500 |
    pub code: String,

    /// Optional suggestion for fixing the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            error: error.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: Option<String>) -> Self {
        self.hint = hint;
        self
    }
}

/// Well-known error codes.
pub mod codes {
    pub const INVALID_PARAMETER: &str = "invalid_parameter";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_OWNER: &str = "not_owner";
    pub const NOT_AUTHORIZED: &str = "not_authorized";
    pub const BANNED: &str = "banned";
    pub const NOT_FOUND: &str = "not_found";
    pub const PARENT_NOT_FOUND: &str = "parent_not_found";
    pub const INVALID_STATE: &str = "invalid_state";
    pub const ALREADY_RESOLVED: &str = "already_resolved";
    pub const DUPLICATE_NAME: &str = "duplicate_name";
    pub const DUPLICATE_FLAG: &str = "duplicate_flag";
    pub const ALREADY_PENDING: &str = "already_pending";
    pub const CONVERSATION_EXISTS: &str = "conversation_exists";
    pub const MAX_DEPTH_EXCEEDED: &str = "max_depth_exceeded";
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const SECRET_LEAK: &str = "secret_leak";
    pub const LIMIT_EXCEEDED: &str = "limit_exceeded";
    pub const RATE_LIMITED: &str = "rate_limited";
    pub const INTERNAL_ERROR: &str = "internal_error";
}
