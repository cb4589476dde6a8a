//! Registration, login, token authentication and public key registration.

use std::sync::Arc;

use domains::{
    CredentialHasher, DomainError, Identity, IdentityRepository, Principal, Result, TokenService,
};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::secure_channel::parse_public_key;

const MAX_USERNAME_LEN: usize = 32;

/// What a successful register or login hands back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    #[serde(rename = "user")]
    pub identity: Identity,
}

#[derive(Clone)]
pub struct IdentityService {
    identities: Arc<dyn IdentityRepository>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<dyn TokenService>,
}

impl IdentityService {
    pub fn new(
        identities: Arc<dyn IdentityRepository>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<dyn TokenService>,
    ) -> Self {
        Self {
            identities,
            hasher,
            tokens,
        }
    }

    #[instrument(skip(self, password))]
    pub async fn register(&self, username: &str, password: &str) -> Result<Session> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(DomainError::Validation("username and password are required".into()));
        }
        if username.chars().count() > MAX_USERNAME_LEN {
            return Err(DomainError::Validation(format!(
                "username is longer than {MAX_USERNAME_LEN} characters"
            )));
        }
        if self.identities.find_by_username(username).await?.is_some() {
            return Err(DomainError::Conflict("username already taken".into()));
        }

        let hash = self.hasher.hash_password(password)?;
        let identity = Identity::new(username.to_string(), hash);
        self.identities.insert_identity(identity.clone()).await?;
        info!(id = %identity.id, "identity registered");

        let token = self.tokens.issue_token(&identity.principal())?;
        Ok(Session { token, identity })
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let identity = self
            .identities
            .find_by_username(username.trim())
            .await?
            .filter(|identity| self.hasher.verify_password(password, &identity.password_hash))
            .ok_or_else(|| DomainError::Unauthorized("invalid username or password".into()))?;

        if identity.is_suspended {
            warn!(id = %identity.id, "login refused for suspended identity");
            let reason = identity.suspension_reason.as_deref().unwrap_or("no reason given");
            return Err(DomainError::Unauthorized(format!("identity is suspended: {reason}")));
        }

        let token = self.tokens.issue_token(&identity.principal())?;
        Ok(Session { token, identity })
    }

    /// Resolves a bearer token to the current principal. The identity is
    /// reloaded so role changes and suspensions apply to existing tokens.
    pub async fn authenticate(&self, token: &str) -> Result<Principal> {
        let claimed = self.tokens.verify_token(token)?;
        let identity = self
            .identities
            .find_identity(claimed.id)
            .await?
            .ok_or_else(|| DomainError::Unauthorized("unknown identity".into()))?;
        if identity.is_suspended {
            return Err(DomainError::Unauthorized("identity is suspended".into()));
        }
        Ok(identity.principal())
    }

    /// Stores the owner's SPKI public key after checking it parses as an
    /// RSA-2048 key.
    pub async fn register_public_key(&self, owner: &Principal, id: Uuid, public_key: String) -> Result<()> {
        if owner.id != id {
            return Err(DomainError::Unauthorized(
                "only the owner may register a public key".into(),
            ));
        }
        parse_public_key(&public_key)?;
        self.identities.set_public_key(id, public_key.trim().to_string()).await?;
        info!(%id, "public key registered");
        Ok(())
    }

    pub async fn public_key(&self, id: Uuid) -> Result<String> {
        let identity = self
            .identities
            .find_identity(id)
            .await?
            .ok_or_else(|| DomainError::not_found("identity", id))?;
        identity
            .public_key
            .ok_or_else(|| DomainError::not_found("public key", id))
    }
}
