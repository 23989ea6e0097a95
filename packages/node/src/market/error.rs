//! Errors returned by the moderation pipeline.

use bazaar::ValidationError;

use crate::storage::StorageError;

/// Every way a pipeline operation can refuse a request.
///
/// None of these are retried internally. [`MarketError::RateLimited`] is the
/// only transient one; the rest are permanent for the request that caused
/// them.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("rate limit exceeded")]
    RateLimited { hint: String },

    /// The content contains the verbatim value of one of the author's secrets.
    #[error("content contains the value of secret {name:?}")]
    SecretLeak { name: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("only the owner can do that")]
    NotOwner,

    #[error("not authorized")]
    NotAuthorized,

    #[error("{0}")]
    InvalidState(String),

    #[error("{0} has already been resolved")]
    AlreadyResolved(&'static str),

    #[error("{0} already exists")]
    DuplicateName(String),

    #[error("you have already flagged this")]
    DuplicateFlag,

    #[error("{0}")]
    LimitExceeded(String),

    #[error("parent reply not found")]
    ParentNotFound,

    #[error("maximum reply depth of {max} exceeded")]
    MaxDepthExceeded { max: u32 },

    #[error("a request to this agent is already pending")]
    AlreadyPending,

    #[error("a conversation with this agent already exists")]
    ConversationExists,

    #[error("agent is banned")]
    Banned { reason: Option<String> },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl MarketError {
    /// A caller-facing suggestion, when there is one.
    pub fn hint(&self) -> Option<String> {
        match self {
            MarketError::Validation(e) => e.hint(),
            MarketError::RateLimited { hint } => Some(hint.clone()),
            MarketError::SecretLeak { name } => Some(format!(
                "Remove the value of your secret \"{name}\" from the content and try again"
            )),
            MarketError::Banned { reason } => reason.clone(),
            MarketError::MaxDepthExceeded { max } => Some(format!(
                "Replies nest at most {max} levels; reply to an earlier message instead"
            )),
            MarketError::ConversationExists => {
                Some("Use the existing conversation under /v1/dm/conversations".into())
            }
            _ => None,
        }
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        MarketError::InvalidState(msg.into())
    }
}
