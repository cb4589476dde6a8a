use async_trait::async_trait;
use chrono::Utc;
use domains::{
    CascadeOutcome, ContentNode, ContentRepository, DomainError, ModerationStatus, NodeOrder,
    NodeScope, Notification, Result,
};
use sqlx::{Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::inbox::insert_notification_tx;
use super::{db_err, decode_err, is_unique_violation, node_from_row, PgStore, NODE_COLUMNS};

#[async_trait]
impl ContentRepository for PgStore {
    /// A reply holds its parent `FOR SHARE` until commit, which serializes it
    /// against the `FOR UPDATE` in `delete_cascade`.
    async fn insert_node(&self, node: ContentNode) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        if let Some(parent_id) = node.parent_id {
            let status: Option<String> =
                sqlx::query_scalar("SELECT status FROM content_nodes WHERE id = $1 FOR SHARE")
                    .bind(parent_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(db_err)?;
            let status = status.ok_or_else(|| DomainError::not_found("node", parent_id))?;
            match ModerationStatus::parse(&status) {
                Some(ModerationStatus::Live) => {}
                Some(_) => {
                    return Err(DomainError::Validation(format!(
                        "node {parent_id} is not accepting replies"
                    )))
                }
                None => return Err(decode_err("status", &status)),
            }
        }

        sqlx::query(
            "INSERT INTO content_nodes (id, author_id, content, kind, parent_id, origin_id, context_binding, status, created_at, edited_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(node.id)
        .bind(node.author_id)
        .bind(&node.content)
        .bind(node.kind.as_str())
        .bind(node.parent_id)
        .bind(node.origin_id)
        .bind(&node.context_binding)
        .bind(node.status.as_str())
        .bind(node.created_at)
        .bind(node.edited_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::Conflict(format!("node {} already exists", node.id))
            } else {
                db_err(e)
            }
        })?;
        tx.commit().await.map_err(db_err)
    }

    async fn find_node(&self, id: Uuid) -> Result<Option<ContentNode>> {
        let row = sqlx::query(&format!("SELECT {NODE_COLUMNS} FROM content_nodes n WHERE n.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(node_from_row).transpose()
    }

    async fn update_content(&self, id: Uuid, content: String) -> Result<ContentNode> {
        let row = sqlx::query(&format!(
            "UPDATE content_nodes n SET content = $2, edited_at = $3 WHERE n.id = $1 RETURNING {NODE_COLUMNS}"
        ))
        .bind(id)
        .bind(content)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| DomainError::not_found("node", id))?;
        node_from_row(&row)
    }

    async fn set_status(&self, id: Uuid, status: ModerationStatus) -> Result<ContentNode> {
        let row = sqlx::query(&format!(
            "UPDATE content_nodes n SET status = $2 WHERE n.id = $1 RETURNING {NODE_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| DomainError::not_found("node", id))?;
        node_from_row(&row)
    }

    /// One transaction: lock the node, collect its direct children, remove
    /// their likes and notifications, remove the nodes, record the notice.
    async fn delete_cascade(&self, id: Uuid, notice: Option<Notification>) -> Result<CascadeOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM content_nodes WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
        if locked.is_none() {
            return Err(DomainError::not_found("node", id));
        }

        let removed_children: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM content_nodes WHERE parent_id = $1 FOR UPDATE")
                .bind(id)
                .fetch_all(&mut *tx)
                .await
                .map_err(db_err)?;
        let doomed: Vec<Uuid> = removed_children.iter().copied().chain([id]).collect();

        let removed_likes = sqlx::query("DELETE FROM like_edges WHERE post_id = ANY($1)")
            .bind(&doomed)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();

        let removed_notifications =
            sqlx::query("DELETE FROM notifications WHERE related_post_id = ANY($1)")
                .bind(&doomed)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?
                .rows_affected();

        sqlx::query("DELETE FROM content_nodes WHERE id = ANY($1)")
            .bind(&doomed)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        if let Some(notice) = &notice {
            insert_notification_tx(notice, &mut tx).await?;
        }

        tx.commit().await.map_err(db_err)?;
        debug!(node = %id, children = removed_children.len(), "cascade committed");

        Ok(CascadeOutcome {
            removed_node: id,
            removed_children,
            removed_likes,
            removed_notifications,
        })
    }

    async fn children_of(&self, parent_ids: &[Uuid]) -> Result<Vec<ContentNode>> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM content_nodes n WHERE n.parent_id = ANY($1)"
        ))
        .bind(parent_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .iter()
        .map(node_from_row)
        .collect()
    }

    async fn with_origin(&self, origin_id: Uuid) -> Result<Vec<ContentNode>> {
        sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM content_nodes n WHERE n.origin_id = $1 AND n.id <> $1"
        ))
        .bind(origin_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .iter()
        .map(node_from_row)
        .collect()
    }

    async fn query_nodes(&self, scope: NodeScope, order: NodeOrder, limit: usize) -> Result<Vec<ContentNode>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {NODE_COLUMNS}, COUNT(l.user_id) AS like_count \
             FROM content_nodes n LEFT JOIN like_edges l ON l.post_id = n.id"
        ));

        match scope {
            NodeScope::All => {}
            NodeScope::Roots => {
                qb.push(" WHERE n.origin_id = n.id");
            }
            NodeScope::Author(author) => {
                qb.push(" WHERE n.author_id = ").push_bind(author);
            }
            NodeScope::RootsByAuthors(authors) => {
                qb.push(" WHERE n.origin_id = n.id AND n.author_id = ANY(")
                    .push_bind(authors)
                    .push(")");
            }
            NodeScope::ChildrenOf(parent) => {
                qb.push(" WHERE n.parent_id = ").push_bind(parent);
            }
        }

        qb.push(" GROUP BY n.id");
        qb.push(match order {
            NodeOrder::Newest => " ORDER BY n.created_at DESC, n.id DESC",
            NodeOrder::Engagement => " ORDER BY like_count DESC, n.created_at DESC, n.id DESC",
        });
        qb.push(" LIMIT ").push_bind(limit as i64);

        qb.build()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(node_from_row)
            .collect()
    }
}
