use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use domains::{CredentialHasher, DomainError, Result};
use tracing::error;

use crate::AuthSetupError;

/// Argon2id password hashing in PHC string format.
pub struct Argon2CredentialHasher {
    argon: Argon2<'static>,
}

impl Default for Argon2CredentialHasher {
    fn default() -> Self {
        Self {
            argon: Argon2::default(),
        }
    }
}

impl Argon2CredentialHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimum-cost parameters. Hashes stay verifiable by `new()` since the
    /// parameters travel inside the PHC string. Tests only.
    pub fn low_cost() -> std::result::Result<Self, AuthSetupError> {
        let params = Params::new(Params::MIN_M_COST, 1, 1, None)
            .map_err(|e| AuthSetupError::Params(e.to_string()))?;
        Ok(Self {
            argon: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl CredentialHasher for Argon2CredentialHasher {
    fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                error!("password hashing failed: {e}");
                DomainError::Internal("password hashing failed".into())
            })
    }

    /// A malformed stored hash verifies as false.
    fn verify_password(&self, password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(p) => p,
            Err(_) => return false,
        };
        self.argon
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}
