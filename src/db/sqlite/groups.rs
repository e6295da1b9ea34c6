use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::common::parse_uuid;
use crate::db::error::{DbError, DbResult};
use crate::db::repos::GroupRepo;
use crate::models::group::ConversationGroup;

pub struct SqliteGroupRepo {
    pool: SqlitePool,
}

impl SqliteGroupRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_group(row: &sqlx::sqlite::SqliteRow) -> DbResult<ConversationGroup> {
        Ok(ConversationGroup {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            created_at: row.get("created_at"),
            deleted_at: row.get("deleted_at"),
        })
    }
}

#[async_trait]
impl GroupRepo for SqliteGroupRepo {
    async fn create(&self, id: Uuid) -> DbResult<ConversationGroup> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO conversation_groups (id, created_at, deleted_at) VALUES (?, ?, NULL)",
        )
        .bind(id.to_string())
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
        let row = sqlx::query(
            "SELECT id, created_at, deleted_at FROM conversation_groups WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_group).transpose()
    }

    async fn delete_cascade(&self, id: Uuid) -> DbResult<()> {
        let id_str = id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM attachments
            WHERE entry_id IN (SELECT id FROM entries WHERE group_id = ?)
            "#,
        )
        .bind(&id_str)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM entries WHERE group_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM conversation_memberships WHERE group_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM ownership_transfers WHERE group_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;

        let now = Utc::now();
        sqlx::query("UPDATE conversations SET deleted_at = ? WHERE group_id = ? AND deleted_at IS NULL")
            .bind(now)
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            "UPDATE conversation_groups SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(&id_str)
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

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            r#"
            CREATE TABLE conversation_groups (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                deleted_at TEXT
            );
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("CREATE TABLE conversations (id TEXT PRIMARY KEY, group_id TEXT, deleted_at TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE entries (id TEXT PRIMARY KEY, group_id TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE attachments (id TEXT PRIMARY KEY, entry_id TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE conversation_memberships (group_id TEXT, user_id TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE ownership_transfers (id TEXT PRIMARY KEY, group_id TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let pool = test_pool().await;
        let repo = SqliteGroupRepo::new(pool);
        let id = Uuid::new_v4();
        let created = repo.create(id).await.unwrap();
        assert_eq!(created.id, id);
        assert!(!created.is_deleted());

        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let pool = test_pool().await;
        let repo = SqliteGroupRepo::new(pool);
        assert!(repo.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_cascade_is_idempotent_failure_on_second_call() {
        let pool = test_pool().await;
        let repo = SqliteGroupRepo::new(pool);
        let id = Uuid::new_v4();
        repo.create(id).await.unwrap();
        repo.delete_cascade(id).await.unwrap();
        let result = repo.delete_cascade(id).await;
        assert!(matches!(result, Err(DbError::NotFound)));
    }
}
