//! HS256 bearer tokens carrying the principal's id, username and role.

use chrono::Utc;
use domains::{DomainError, Principal, Result, Role, TokenService};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::AuthSetupError;

pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    username: String,
    role: Role,
    iat: i64,
    exp: i64,
}

pub struct JwtTokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl JwtTokenService {
    pub fn new(secret: &str, ttl_secs: u64) -> std::result::Result<Self, AuthSetupError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthSetupError::WeakSecret { min: MIN_SECRET_LEN });
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        })
    }
}

impl TokenService for JwtTokenService {
    fn issue_token(&self, principal: &Principal) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: principal.id,
            username: principal.username.clone(),
            role: principal.role,
            iat: now,
            exp: now.saturating_add(self.ttl_secs),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| DomainError::Internal(format!("failed to sign token: {e}")))
    }

    fn verify_token(&self, token: &str) -> Result<Principal> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|err| {
            use jsonwebtoken::errors::ErrorKind;
            debug!("token rejected: {err}");
            let reason = match err.kind() {
                ErrorKind::ExpiredSignature => "token expired",
                ErrorKind::InvalidSignature => "invalid token signature",
                _ => "invalid token",
            };
            DomainError::Unauthorized(reason.into())
        })?;

        Ok(Principal {
            id: data.claims.sub,
            username: data.claims.username,
            role: data.claims.role,
        })
    }
}
