//! # auth-adapters
//!
//! Implementations of the `CredentialHasher` and `TokenService` ports.

pub mod argon;
#[cfg(feature = "auth-jwt")]
pub mod jwt;

use thiserror::Error;

pub use argon::Argon2CredentialHasher;
#[cfg(feature = "auth-jwt")]
pub use jwt::JwtTokenService;

/// Raised while constructing an adapter from configuration.
#[derive(Debug, Error)]
pub enum AuthSetupError {
    #[error("token secret must be at least {min} bytes")]
    WeakSecret { min: usize },
    #[error("invalid argon2 parameters: {0}")]
    Params(String),
}
