//! # PostgreSQL adapter
//!
//! Runtime-checked `sqlx` queries against the schema in `migrations/`.
//! Driver errors are logged here and surface as an opaque
//! `DomainError::Internal`.

mod content;
mod edges;
mod identities;
mod inbox;

use domains::{
    ContentNode, DomainError, Identity, IdentitySummary, ModerationStatus, NodeKind, Role,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{error, info};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        info!(max_connections, "postgres pool ready");
        Ok(Self { pool })
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub(crate) fn db_err(err: sqlx::Error) -> DomainError {
    error!(error = %err, "database error");
    DomainError::Internal("database error".into())
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

fn decode_err(column: &str, raw: &str) -> DomainError {
    error!(column, value = raw, "unrecognised enum value in row");
    DomainError::Internal(format!("corrupt {column} column"))
}

pub(crate) const IDENTITY_COLUMNS: &str =
    "id, username, password_hash, role, is_verified, is_suspended, suspension_reason, public_key, created_at";

pub(crate) fn identity_from_row(row: &PgRow) -> Result<Identity, DomainError> {
    let role: String = row.try_get("role").map_err(db_err)?;
    Ok(Identity {
        id: row.try_get("id").map_err(db_err)?,
        username: row.try_get("username").map_err(db_err)?,
        password_hash: row.try_get("password_hash").map_err(db_err)?,
        role: Role::parse(&role).ok_or_else(|| decode_err("role", &role))?,
        is_verified: row.try_get("is_verified").map_err(db_err)?,
        is_suspended: row.try_get("is_suspended").map_err(db_err)?,
        suspension_reason: row.try_get("suspension_reason").map_err(db_err)?,
        public_key: row.try_get("public_key").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

pub(crate) fn summary_from_row(row: &PgRow) -> Result<IdentitySummary, DomainError> {
    Ok(IdentitySummary {
        id: row.try_get("id").map_err(db_err)?,
        username: row.try_get("username").map_err(db_err)?,
        is_verified: row.try_get("is_verified").map_err(db_err)?,
        is_suspended: row.try_get("is_suspended").map_err(db_err)?,
    })
}

pub(crate) const NODE_COLUMNS: &str =
    "n.id, n.author_id, n.content, n.kind, n.parent_id, n.origin_id, n.context_binding, n.status, n.created_at, n.edited_at";

pub(crate) fn node_from_row(row: &PgRow) -> Result<ContentNode, DomainError> {
    let kind: String = row.try_get("kind").map_err(db_err)?;
    let status: String = row.try_get("status").map_err(db_err)?;
    Ok(ContentNode {
        id: row.try_get("id").map_err(db_err)?,
        author_id: row.try_get("author_id").map_err(db_err)?,
        content: row.try_get("content").map_err(db_err)?,
        kind: NodeKind::parse(&kind).ok_or_else(|| decode_err("kind", &kind))?,
        parent_id: row.try_get("parent_id").map_err(db_err)?,
        origin_id: row.try_get("origin_id").map_err(db_err)?,
        context_binding: row.try_get("context_binding").map_err(db_err)?,
        status: ModerationStatus::parse(&status).ok_or_else(|| decode_err("status", &status))?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        edited_at: row.try_get("edited_at").map_err(db_err)?,
    })
}
