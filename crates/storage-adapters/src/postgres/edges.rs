//! Like and follow edges. Both toggles are delete-then-conditional-insert
//! inside one transaction; the primary key absorbs a concurrent duplicate.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use domains::{FollowRepository, LikeRepository, LikeToggle, Result};
use uuid::Uuid;

use super::{db_err, PgStore};

#[async_trait]
impl LikeRepository for PgStore {
    async fn toggle_like(&self, user_id: Uuid, post_id: Uuid) -> Result<LikeToggle> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let removed = sqlx::query("DELETE FROM like_edges WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();

        let (liked, changed) = if removed > 0 {
            (false, true)
        } else {
            let inserted = sqlx::query(
                "INSERT INTO like_edges (user_id, post_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();
            (true, inserted > 0)
        };

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM like_edges WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(LikeToggle {
            liked,
            count: count as u64,
            changed,
        })
    }

    async fn like_counts(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, u64>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT post_id, COUNT(*) FROM like_edges WHERE post_id = ANY($1) GROUP BY post_id",
        )
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(|(id, n)| (id, n as u64)).collect())
    }

    async fn liked_by(&self, user_id: Uuid, post_ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT post_id FROM like_edges WHERE user_id = $1 AND post_id = ANY($2)",
        )
        .bind(user_id)
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(ids.into_iter().collect())
    }
}

#[async_trait]
impl FollowRepository for PgStore {
    async fn toggle_follow(&self, follower_id: Uuid, following_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let removed =
            sqlx::query("DELETE FROM follow_edges WHERE follower_id = $1 AND following_id = $2")
                .bind(follower_id)
                .bind(following_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?
                .rows_affected();

        if removed == 0 {
            sqlx::query(
                "INSERT INTO follow_edges (follower_id, following_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(follower_id)
            .bind(following_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(removed == 0)
    }

    async fn is_following(&self, follower_id: Uuid, following_id: Uuid) -> Result<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follow_edges WHERE follower_id = $1 AND following_id = $2)",
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn count_followers(&self, id: Uuid) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follow_edges WHERE following_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(n as u64)
    }

    async fn count_following(&self, id: Uuid) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follow_edges WHERE follower_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(n as u64)
    }

    async fn following_ids(&self, follower_id: Uuid) -> Result<Vec<Uuid>> {
        sqlx::query_scalar(
            "SELECT following_id FROM follow_edges WHERE follower_id = $1 ORDER BY created_at DESC",
        )
        .bind(follower_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn follower_ids(&self, following_id: Uuid) -> Result<Vec<Uuid>> {
        sqlx::query_scalar(
            "SELECT follower_id FROM follow_edges WHERE following_id = $1 ORDER BY created_at DESC",
        )
        .bind(following_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }
}
