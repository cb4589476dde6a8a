use async_trait::async_trait;
use domains::{
    ConversationSummary, DirectMessage, DomainError, IdentitySummary, MessageRepository,
    Notification, NotificationRepository, NotificationType, NotificationView, Result,
};
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use super::{db_err, PgStore};

const INSERT_NOTIFICATION: &str =
    "INSERT INTO notifications (id, recipient_id, actor_id, kind, related_post_id, reason, context_snippet, is_read, created_at) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)";

/// Shared with the cascade so the moderation notice commits with the delete.
pub(super) async fn insert_notification_tx(
    n: &Notification,
    tx: &mut Transaction<'_, Postgres>,
) -> Result<()> {
    sqlx::query(INSERT_NOTIFICATION)
        .bind(n.id)
        .bind(n.recipient_id)
        .bind(n.actor_id)
        .bind(n.kind.as_str())
        .bind(n.related_post_id)
        .bind(&n.reason)
        .bind(&n.context_snippet)
        .bind(n.is_read)
        .bind(n.created_at)
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;
    Ok(())
}

fn notification_from_row(row: &PgRow) -> Result<Notification> {
    let kind: String = row.try_get("kind").map_err(db_err)?;
    Ok(Notification {
        id: row.try_get("id").map_err(db_err)?,
        recipient_id: row.try_get("recipient_id").map_err(db_err)?,
        actor_id: row.try_get("actor_id").map_err(db_err)?,
        kind: NotificationType::parse(&kind)
            .ok_or_else(|| DomainError::Internal(format!("corrupt notification kind {kind}")))?,
        related_post_id: row.try_get("related_post_id").map_err(db_err)?,
        reason: row.try_get("reason").map_err(db_err)?,
        context_snippet: row.try_get("context_snippet").map_err(db_err)?,
        is_read: row.try_get("is_read").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

const NOTIFICATION_COLUMNS: &str =
    "n.id, n.recipient_id, n.actor_id, n.kind, n.related_post_id, n.reason, n.context_snippet, n.is_read, n.created_at";

#[async_trait]
impl NotificationRepository for PgStore {
    async fn insert_notification(&self, notification: Notification) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        insert_notification_tx(&notification, &mut tx).await?;
        tx.commit().await.map_err(db_err)
    }

    async fn find_notification(&self, id: Uuid) -> Result<Option<Notification>> {
        let row = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications n WHERE n.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(notification_from_row).transpose()
    }

    async fn list_for_recipient(&self, recipient_id: Uuid, limit: usize) -> Result<Vec<NotificationView>> {
        let rows = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS}, \
                    u.username AS actor_username, u.is_verified AS actor_verified, \
                    u.is_suspended AS actor_suspended, p.content AS post_snippet \
             FROM notifications n \
             LEFT JOIN identities u ON u.id = n.actor_id \
             LEFT JOIN content_nodes p ON p.id = n.related_post_id \
             WHERE n.recipient_id = $1 \
             ORDER BY n.created_at DESC, n.id DESC \
             LIMIT $2"
        ))
        .bind(recipient_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                let notification = notification_from_row(row)?;
                let username: Option<String> = row.try_get("actor_username").map_err(db_err)?;
                let actor = match username {
                    Some(username) => Some(IdentitySummary {
                        id: notification.actor_id,
                        username,
                        is_verified: row.try_get("actor_verified").map_err(db_err)?,
                        is_suspended: row.try_get("actor_suspended").map_err(db_err)?,
                    }),
                    None => None,
                };
                Ok(NotificationView {
                    actor,
                    post_snippet: row.try_get("post_snippet").map_err(db_err)?,
                    notification,
                })
            })
            .collect()
    }

    async fn mark_all_read(&self, recipient_id: Uuid) -> Result<u64> {
        Ok(sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(recipient_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?
        .rows_affected())
    }

    async fn delete_notification(&self, id: Uuid) -> Result<()> {
        let removed = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?
            .rows_affected();
        if removed == 0 {
            return Err(DomainError::not_found("notification", id));
        }
        Ok(())
    }

    async fn unread_count(&self, recipient_id: Uuid) -> Result<u64> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(n as u64)
    }
}

fn message_from_row(row: &PgRow) -> Result<DirectMessage> {
    Ok(DirectMessage {
        id: row.try_get("id").map_err(db_err)?,
        sender_id: row.try_get("sender_id").map_err(db_err)?,
        receiver_id: row.try_get("receiver_id").map_err(db_err)?,
        body: row.try_get("body").map_err(db_err)?,
        is_encrypted: row.try_get("is_encrypted").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

#[async_trait]
impl MessageRepository for PgStore {
    async fn insert_message(&self, message: DirectMessage) -> Result<()> {
        sqlx::query(
            "INSERT INTO direct_messages (id, sender_id, receiver_id, body, is_encrypted, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(message.id)
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(&message.body)
        .bind(message.is_encrypted)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn conversation(&self, a: Uuid, b: Uuid) -> Result<Vec<DirectMessage>> {
        sqlx::query(
            "SELECT id, sender_id, receiver_id, body, is_encrypted, created_at FROM direct_messages \
             WHERE (sender_id = $1 AND receiver_id = $2) OR (sender_id = $2 AND receiver_id = $1) \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(a)
        .bind(b)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .iter()
        .map(message_from_row)
        .collect()
    }

    async fn conversations(&self, identity: Uuid) -> Result<Vec<ConversationSummary>> {
        let rows = sqlx::query(
            "SELECT c.counterpart, c.body, c.is_encrypted, c.created_at, \
                    u.username, u.is_verified, u.is_suspended \
             FROM ( \
                 SELECT DISTINCT ON (counterpart) counterpart, id, body, is_encrypted, created_at \
                 FROM ( \
                     SELECT m.*, CASE WHEN m.sender_id = $1 THEN m.receiver_id ELSE m.sender_id END AS counterpart \
                     FROM direct_messages m \
                     WHERE m.sender_id = $1 OR m.receiver_id = $1 \
                 ) mine \
                 ORDER BY counterpart, created_at DESC, id DESC \
             ) c \
             JOIN identities u ON u.id = c.counterpart \
             ORDER BY c.created_at DESC, c.id DESC",
        )
        .bind(identity)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                Ok(ConversationSummary {
                    counterpart: IdentitySummary {
                        id: row.try_get("counterpart").map_err(db_err)?,
                        username: row.try_get("username").map_err(db_err)?,
                        is_verified: row.try_get("is_verified").map_err(db_err)?,
                        is_suspended: row.try_get("is_suspended").map_err(db_err)?,
                    },
                    last_body: row.try_get("body").map_err(db_err)?,
                    last_is_encrypted: row.try_get("is_encrypted").map_err(db_err)?,
                    last_at: row.try_get("created_at").map_err(db_err)?,
                })
            })
            .collect()
    }
}
