use async_trait::async_trait;
use domains::{DomainError, Identity, IdentityRepository, IdentitySummary, Notification, Result};
use uuid::Uuid;

use super::inbox::insert_notification_tx;
use super::{db_err, identity_from_row, is_unique_violation, summary_from_row, PgStore, IDENTITY_COLUMNS};

#[async_trait]
impl IdentityRepository for PgStore {
    async fn insert_identity(&self, identity: Identity) -> Result<()> {
        sqlx::query(
            "INSERT INTO identities (id, username, password_hash, role, is_verified, is_suspended, suspension_reason, public_key, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(identity.id)
        .bind(&identity.username)
        .bind(&identity.password_hash)
        .bind(identity.role.as_str())
        .bind(identity.is_verified)
        .bind(identity.is_suspended)
        .bind(&identity.suspension_reason)
        .bind(&identity.public_key)
        .bind(identity.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::Conflict(format!("username {} already taken", identity.username))
            } else {
                db_err(e)
            }
        })?;
        Ok(())
    }

    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>> {
        let row = sqlx::query(&format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(identity_from_row).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>> {
        let row = sqlx::query(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(identity_from_row).transpose()
    }

    async fn summaries(&self, ids: &[Uuid]) -> Result<Vec<IdentitySummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        // Preserve the caller's order.
        sqlx::query(
            "SELECT i.id, i.username, i.is_verified, i.is_suspended \
             FROM unnest($1::uuid[]) WITH ORDINALITY AS wanted(id, pos) \
             JOIN identities i ON i.id = wanted.id \
             ORDER BY wanted.pos",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .iter()
        .map(summary_from_row)
        .collect()
    }

    async fn set_public_key(&self, id: Uuid, public_key: String) -> Result<()> {
        let updated = sqlx::query("UPDATE identities SET public_key = $2 WHERE id = $1")
            .bind(id)
            .bind(public_key)
            .execute(&self.pool)
            .await
            .map_err(db_err)?
            .rows_affected();
        if updated == 0 {
            return Err(DomainError::not_found("identity", id));
        }
        Ok(())
    }

    async fn search_identities(&self, query: &str, limit: usize) -> Result<Vec<IdentitySummary>> {
        let pattern = format!("%{}%", escape_like(query));
        sqlx::query(
            "SELECT id, username, is_verified, is_suspended FROM identities \
             WHERE username ILIKE $1 ORDER BY username LIMIT $2",
        )
        .bind(pattern)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .iter()
        .map(summary_from_row)
        .collect()
    }

    /// The flag and the notice commit together or not at all.
    async fn set_suspension(
        &self,
        id: Uuid,
        suspended: bool,
        reason: Option<String>,
        notice: Option<Notification>,
    ) -> Result<Identity> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query(&format!(
            "UPDATE identities SET is_suspended = $2, suspension_reason = $3 WHERE id = $1 \
             RETURNING {IDENTITY_COLUMNS}"
        ))
        .bind(id)
        .bind(suspended)
        .bind(reason)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .ok_or_else(|| DomainError::not_found("identity", id))?;
        let updated = identity_from_row(&row)?;

        if let Some(notice) = &notice {
            insert_notification_tx(notice, &mut tx).await?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(updated)
    }
}

/// `%` and `_` in a search term match literally.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("ada"), "ada");
        assert_eq!(escape_like("100%_real"), "100\\%\\_real");
    }
}
