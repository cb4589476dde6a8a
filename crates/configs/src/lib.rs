//! # configs
//!
//! Layered runtime settings: built-in defaults, then an optional
//! `echohub.toml` in the working directory, then `ECHOHUB__SECTION__KEY`
//! environment variables. A `.env` file is loaded into the environment first
//! when present.
//!
//! ```text
//! ECHOHUB__AUTH__JWT_SECRET=...            # required, >= 32 bytes
//! ECHOHUB__STORAGE__BACKEND=postgres
//! ECHOHUB__DATABASE__URL=postgres://...
//! ECHOHUB__RATE_LIMIT__WINDOW_SECS=2
//! ```

use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] ConfigError),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub storage: StorageSettings,
    pub rate_limit: RateLimitSettings,
    pub realtime: RealtimeSettings,
    pub log: LogSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// Required when `storage.backend = "postgres"`.
    pub url: Option<SecretString>,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: SecretString,
    pub token_ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize)]
pub struct StorageSettings {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize)]
pub struct RateLimitSettings {
    pub submissions_per_window: u32,
    pub window_secs: u64,
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct RealtimeSettings {
    /// Frames queued per live connection before events are dropped for it.
    pub connection_buffer: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    pub format: LogFormat,
}

impl Settings {
    /// Reads `.env`, `echohub.toml` and the environment.
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        let builder = Self::defaults()?
            .add_source(File::with_name("echohub").required(false))
            .add_source(
                Environment::with_prefix("ECHOHUB")
                    .separator("__")
                    .try_parsing(true),
            );
        Self::from_builder(builder)
    }

    /// Built-in defaults. Everything except the JWT secret has one.
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, SettingsError> {
        Ok(Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", 10)?
            .set_default("auth.token_ttl_secs", 7 * 24 * 60 * 60)?
            .set_default("storage.backend", "memory")?
            .set_default("rate_limit.submissions_per_window", 1)?
            .set_default("rate_limit.window_secs", 2)?
            .set_default("realtime.connection_buffer", 64)?
            .set_default("log.format", "pretty")?)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, SettingsError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.auth.jwt_secret.expose_secret().len() < MIN_JWT_SECRET_LEN {
            return Err(SettingsError::Invalid(format!(
                "auth.jwt_secret must be at least {MIN_JWT_SECRET_LEN} bytes"
            )));
        }
        if self.rate_limit.window_secs == 0 || self.rate_limit.submissions_per_window == 0 {
            return Err(SettingsError::Invalid(
                "rate_limit.window_secs and rate_limit.submissions_per_window must be positive".into(),
            ));
        }
        if self.realtime.connection_buffer == 0 {
            return Err(SettingsError::Invalid("realtime.connection_buffer must be positive".into()));
        }
        if self.storage.backend == StorageBackend::Postgres && self.database.url.is_none() {
            return Err(SettingsError::Invalid(
                "database.url is required for the postgres backend".into(),
            ));
        }
        Ok(())
    }
}
