//! # echohub
//!
//! Assembles the adapters chosen by configuration and compile-time features,
//! then serves the HTTP API and the live channel.

use std::sync::Arc;

use anyhow::Context;
use api_adapters::{router, AppState};
use auth_adapters::{Argon2CredentialHasher, JwtTokenService};
use configs::{LogFormat, Settings, StorageBackend};
use secrecy::ExposeSecret;
use services::{AppServices, Ports, RateLimitConfig, RealtimeBus, SubmissionThrottle};
use storage_adapters::MemoryStore;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading configuration")?;
    init_tracing(settings.log.format);

    let ports = build_ports(&settings).await?;
    let bus = RealtimeBus::new(settings.realtime.connection_buffer);
    let throttle = SubmissionThrottle::new(RateLimitConfig {
        requests_per_window: settings.rate_limit.submissions_per_window,
        window_duration: settings.rate_limit.window(),
        ..RateLimitConfig::default()
    });

    let services = AppServices::new(ports, bus, throttle);
    let app = router(AppState::new(services));

    let addr = settings.server.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, backend = ?settings.storage.backend, "echohub listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("echohub=info,services=info,api_adapters=info,tower_http=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn build_ports(settings: &Settings) -> anyhow::Result<Ports> {
    let hasher = Arc::new(Argon2CredentialHasher::new());
    let tokens = Arc::new(
        JwtTokenService::new(
            settings.auth.jwt_secret.expose_secret(),
            settings.auth.token_ttl_secs,
        )
        .context("configuring token service")?,
    );

    match settings.storage.backend {
        StorageBackend::Memory => {
            let store = Arc::new(MemoryStore::new());
            Ok(Ports {
                identities: store.clone(),
                content: store.clone(),
                likes: store.clone(),
                follows: store.clone(),
                notifications: store.clone(),
                messages: store,
                hasher,
                tokens,
            })
        }
        #[cfg(feature = "db-postgres")]
        StorageBackend::Postgres => {
            let url = settings
                .database
                .url
                .as_ref()
                .context("database.url is required for the postgres backend")?;
            let store = storage_adapters::PgStore::connect(
                url.expose_secret(),
                settings.database.max_connections,
            )
            .await
            .context("connecting to postgres")?;
            store.migrate().await.context("running migrations")?;
            let store = Arc::new(store);
            Ok(Ports {
                identities: store.clone(),
                content: store.clone(),
                likes: store.clone(),
                follows: store.clone(),
                notifications: store.clone(),
                messages: store,
                hasher,
                tokens,
            })
        }
        #[cfg(not(feature = "db-postgres"))]
        StorageBackend::Postgres => {
            anyhow::bail!("this build has no postgres support; rebuild with the db-postgres feature")
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
