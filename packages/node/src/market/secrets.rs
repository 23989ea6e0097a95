//! The secret registry.
//!
//! Agents register the credentials they hold so the pipeline can refuse any
//! content that would publish one. Values are stored but never returned.

use bazaar::validation::{validate_secret_name, validate_secret_value};
use bazaar::{new_id, Secret};
use bazaar_node_api::{AddSecretRequest, SecretSummary};
use chrono::Utc;

use super::{MarketError, Marketplace};
use crate::storage::StorageError;

/// How a caller names the secret to remove.
#[derive(Debug, Clone, Copy)]
pub enum SecretRef<'a> {
    Id(&'a str),
    Name(&'a str),
}

impl Marketplace {
    pub async fn add_secret(
        &self,
        agent_id: &str,
        req: AddSecretRequest,
    ) -> Result<SecretSummary, MarketError> {
        validate_secret_name(&req.name)?;
        validate_secret_value(&req.value)?;
        self.active_agent(agent_id).await?;

        if self.storage.count_secrets(agent_id).await? >= self.policy.max_secrets {
            return Err(MarketError::LimitExceeded(format!(
                "an agent can register at most {} secrets",
                self.policy.max_secrets
            )));
        }

        let secret = Secret {
            id: new_id(),
            agent_id: agent_id.to_string(),
            name: req.name,
            value: req.value,
            created_at: Utc::now(),
        };
        match self.storage.insert_secret(&secret).await {
            Ok(()) => Ok(SecretSummary::from(&secret)),
            Err(StorageError::Conflict(_)) => Err(MarketError::DuplicateName(format!(
                "secret {}",
                secret.name
            ))),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remove_secret(
        &self,
        agent_id: &str,
        secret: SecretRef<'_>,
    ) -> Result<(), MarketError> {
        self.active_agent(agent_id).await?;
        let found = match secret {
            SecretRef::Id(id) => self.storage.get_secret(id).await?,
            SecretRef::Name(name) => self.storage.get_secret_by_name(agent_id, name).await?,
        };
        let secret = found.ok_or(MarketError::NotFound("secret"))?;
        if secret.agent_id != agent_id {
            return Err(MarketError::NotOwner);
        }
        self.storage.delete_secret(&secret.id).await?;
        Ok(())
    }

    pub async fn list_secrets(&self, agent_id: &str) -> Result<Vec<SecretSummary>, MarketError> {
        let secrets = self.storage.list_secrets(agent_id).await?;
        Ok(secrets.iter().map(SecretSummary::from).collect())
    }

    /// Name of the first of the agent's secrets, in registration order, whose
    /// value occurs verbatim in `content`.
    pub async fn check_leak(
        &self,
        agent_id: &str,
        content: &str,
    ) -> Result<Option<String>, MarketError> {
        let secrets = self.storage.list_secrets(agent_id).await?;
        Ok(secrets
            .into_iter()
            .find(|s| content.contains(s.value.as_str()))
            .map(|s| s.name))
    }

    /// [`MarketError::SecretLeak`] when `content` contains a secret.
    pub(crate) async fn ensure_no_leak(
        &self,
        agent_id: &str,
        content: &str,
    ) -> Result<(), MarketError> {
        match self.check_leak(agent_id, content).await? {
            Some(name) => Err(MarketError::SecretLeak { name }),
            None => Ok(()),
        }
    }
}
