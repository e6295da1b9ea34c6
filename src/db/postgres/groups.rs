use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::db::error::{DbError, DbResult};
use crate::db::repos::GroupRepo;
use crate::models::group::ConversationGroup;

pub struct PostgresGroupRepo {
    pool: PgPool,
}

impl PostgresGroupRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_group(row: &sqlx::postgres::PgRow) -> ConversationGroup {
        ConversationGroup {
            id: row.get("id"),
            created_at: row.get("created_at"),
            deleted_at: row.get("deleted_at"),
        }
    }
}

#[async_trait]
impl GroupRepo for PostgresGroupRepo {
    async fn create(&self, id: Uuid) -> DbResult<ConversationGroup> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO conversation_groups (id, created_at, deleted_at) VALUES ($1, $2, NULL)",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(ConversationGroup {
            id,
            created_at: now,
            deleted_at: None,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<ConversationGroup>> {
        let row = sqlx::query("SELECT id, created_at, deleted_at FROM conversation_groups WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(Self::row_to_group))
    }

    async fn delete_cascade(&self, id: Uuid) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM attachments WHERE entry_id IN (SELECT id FROM entries WHERE group_id = $1)")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM entries WHERE group_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM conversation_memberships WHERE group_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM ownership_transfers WHERE group_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let now = Utc::now();
        sqlx::query("UPDATE conversations SET deleted_at = $1 WHERE group_id = $2 AND deleted_at IS NULL")
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            "UPDATE conversation_groups SET deleted_at = $1 WHERE id = $2 AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DbError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}
