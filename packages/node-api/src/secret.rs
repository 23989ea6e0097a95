//! Secret registry types. Secret values are write-only over the API.

use bazaar::Secret;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /v1/secrets`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddSecretRequest {
    pub name: String,
    pub value: String,
}

/// A secret without its value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecretSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Secret> for SecretSummary {
    fn from(s: &Secret) -> Self {
        Self {
            id: s.id.clone(),
            name: s.name.clone(),
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecretsResponse {
    pub secrets: Vec<SecretSummary>,
}
