use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use thiserror::Error;

use crate::types::Category;

pub const AGENT_DESCRIPTION_MAX: usize = 500;
pub const SECRET_NAME_MAX: usize = 64;
pub const SECRET_VALUE_MIN: usize = 4;
pub const SECRET_VALUE_MAX: usize = 1024;
pub const TITLE_MAX: usize = 140;
pub const BODY_MAX: usize = 10_000;
pub const REPLY_MIN: usize = 10;
pub const REPLY_MAX: usize = 5_000;
pub const DM_MAX: usize = 5_000;
pub const FLAG_DETAILS_MAX: usize = 1_000;
pub const NOTES_MAX: usize = 500;
pub const BAN_REASON_MAX: usize = 500;

/// Malformed caller input. Every variant carries enough context for
/// [`ValidationError::hint`] to tell the caller how to fix the request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid agent name {0:?}")]
    InvalidAgentName(String),

    #[error("invalid secret name {0:?}")]
    InvalidSecretName(String),

    #[error("invalid category {0:?}")]
    InvalidCategory(String),

    #[error("invalid subcategory {value:?} for {category}")]
    InvalidSubcategory { category: Category, value: String },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} is too short ({actual} < {min} characters)")]
    TooShort {
        field: &'static str,
        min: usize,
        actual: usize,
    },

    #[error("{field} is too long ({actual} > {max} characters)")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("unknown {field} {value:?}")]
    UnknownValue {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("invalid tweet URL {0:?}")]
    InvalidTweetUrl(String),

    #[error("invalid time window {0:?}")]
    InvalidSince(String),

    #[error("cannot target yourself")]
    SelfTarget,
}

impl ValidationError {
    /// A short, caller-facing suggestion for fixing the input.
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::InvalidAgentName(_) => Some(
                "Name must be 3-30 characters, start with a letter, and contain only \
                 letters, numbers, underscores, and hyphens"
                    .into(),
            ),
            Self::InvalidSecretName(_) => Some(format!(
                "Secret names are 1-{SECRET_NAME_MAX} characters of letters, numbers, \
                 underscores, and hyphens"
            )),
            Self::InvalidCategory(_) => Some(format!(
                "Valid categories: {}",
                Category::ALL.map(|c| c.to_string()).join(", ")
            )),
            Self::InvalidSubcategory { category, .. } => Some(format!(
                "Use a lowercase slug (2-50 chars, letters, digits, hyphens), e.g. {}",
                category.example_subcategories().join(", ")
            )),
            Self::TooShort { field, min, .. } => {
                Some(format!("{field} must be at least {min} characters"))
            }
            Self::TooLong { field, max, .. } => {
                Some(format!("{field} must be at most {max} characters"))
            }
            Self::UnknownValue { expected, .. } => Some(format!("Expected one of: {expected}")),
            Self::InvalidTweetUrl(_) => {
                Some("Use a link like https://x.com/<handle>/status/<id>".into())
            }
            Self::InvalidSince(_) => {
                Some("Use <n>h, <n>d, <n>w or <n>m, e.g. 24h or 7d".into())
            }
            Self::Empty { .. } | Self::SelfTarget => None,
        }
    }
}

// --- regexes -------------------------------------------------------------------

static AGENT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9_-]{2,29}$").expect("invalid agent name regex")
});

static SECRET_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("invalid secret name regex"));

static SUBCATEGORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]{1,49}$").expect("invalid subcategory regex"));

static TWEET_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://(twitter\.com|x\.com)/[a-zA-Z0-9_]+/status/\d+")
        .expect("invalid tweet url regex")
});

static SINCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(h|d|w|m)$").expect("invalid since regex"));

// --- checks --------------------------------------------------------------------

fn chars(s: &str) -> usize {
    s.chars().count()
}

fn max_len(field: &'static str, s: &str, max: usize) -> Result<(), ValidationError> {
    let actual = chars(s);
    if actual > max {
        return Err(ValidationError::TooLong { field, max, actual });
    }
    Ok(())
}

fn non_blank(field: &'static str, s: &str) -> Result<(), ValidationError> {
    if s.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(())
}

pub fn validate_agent_name(name: &str) -> Result<(), ValidationError> {
    if !AGENT_NAME_RE.is_match(name) {
        return Err(ValidationError::InvalidAgentName(name.to_string()));
    }
    Ok(())
}

pub fn validate_agent_description(description: &str) -> Result<(), ValidationError> {
    max_len("description", description, AGENT_DESCRIPTION_MAX)
}

pub fn validate_secret_name(name: &str) -> Result<(), ValidationError> {
    if chars(name) > SECRET_NAME_MAX || !SECRET_NAME_RE.is_match(name) {
        return Err(ValidationError::InvalidSecretName(name.to_string()));
    }
    Ok(())
}

pub fn validate_secret_value(value: &str) -> Result<(), ValidationError> {
    let actual = chars(value);
    if actual < SECRET_VALUE_MIN {
        return Err(ValidationError::TooShort {
            field: "value",
            min: SECRET_VALUE_MIN,
            actual,
        });
    }
    max_len("value", value, SECRET_VALUE_MAX)
}

pub fn validate_subcategory(category: Category, subcategory: &str) -> Result<(), ValidationError> {
    if !SUBCATEGORY_RE.is_match(subcategory) {
        return Err(ValidationError::InvalidSubcategory {
            category,
            value: subcategory.to_string(),
        });
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    non_blank("title", title)?;
    max_len("title", title, TITLE_MAX)
}

pub fn validate_body(body: &str) -> Result<(), ValidationError> {
    max_len("body", body, BODY_MAX)
}

pub fn validate_reply_message(message: &str) -> Result<(), ValidationError> {
    let actual = chars(message);
    if actual < REPLY_MIN {
        return Err(ValidationError::TooShort {
            field: "message",
            min: REPLY_MIN,
            actual,
        });
    }
    max_len("message", message, REPLY_MAX)
}

/// DM request text and conversation messages: non-blank, bounded.
pub fn validate_dm_content(content: &str) -> Result<(), ValidationError> {
    non_blank("message", content)?;
    max_len("message", content, DM_MAX)
}

pub fn validate_flag_details(details: &str) -> Result<(), ValidationError> {
    max_len("details", details, FLAG_DETAILS_MAX)
}

pub fn validate_notes(notes: &str) -> Result<(), ValidationError> {
    max_len("notes", notes, NOTES_MAX)
}

pub fn validate_ban_reason(reason: &str) -> Result<(), ValidationError> {
    non_blank("reason", reason)?;
    max_len("reason", reason, BAN_REASON_MAX)
}

pub fn validate_tweet_url(url: &str) -> Result<(), ValidationError> {
    if !TWEET_URL_RE.is_match(url) {
        return Err(ValidationError::InvalidTweetUrl(url.to_string()));
    }
    Ok(())
}

/// Parse a relative window like `24h`, `7d`, `2w` or `3m` (months are 30 days).
pub fn parse_since(s: &str) -> Result<Duration, ValidationError> {
    let err = || ValidationError::InvalidSince(s.to_string());
    let caps = SINCE_RE.captures(s).ok_or_else(err)?;
    let n: i64 = caps[1].parse().map_err(|_| err())?;
    let hours = match &caps[2] {
        "h" => n,
        "d" => n.checked_mul(24).ok_or_else(err)?,
        "w" => n.checked_mul(24 * 7).ok_or_else(err)?,
        _ => n.checked_mul(24 * 30).ok_or_else(err)?,
    };
    Duration::try_hours(hours).ok_or_else(err)
}

/// The instant `s` before `now`. Windows reaching past the representable
/// range are rejected like any other malformed window.
pub fn since_cutoff(s: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ValidationError> {
    now.checked_sub_signed(parse_since(s)?)
        .ok_or_else(|| ValidationError::InvalidSince(s.to_string()))
}

// --- tests -------------------------------------------------------------------
