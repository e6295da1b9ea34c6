use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::common::parse_uuid;
use crate::db::error::{DbError, DbResult};
use crate::db::repos::TransferRepo;
use crate::models::transfer::OwnershipTransfer;

pub struct SqliteTransferRepo {
    pool: SqlitePool,
}

impl SqliteTransferRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_transfer(row: &sqlx::sqlite::SqliteRow) -> DbResult<OwnershipTransfer> {
        Ok(OwnershipTransfer {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            group_id: parse_uuid(&row.get::<String, _>("group_id"))?,
            from_user_id: parse_uuid(&row.get::<String, _>("from_user_id"))?,
            to_user_id: parse_uuid(&row.get::<String, _>("to_user_id"))?,
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl TransferRepo for SqliteTransferRepo {
    async fn create(
        &self,
        group_id: Uuid,
        from_user_id: Uuid,
        to_user_id: Uuid,
    ) -> DbResult<OwnershipTransfer> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO ownership_transfers (id, group_id, from_user_id, to_user_id, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(group_id.to_string())
        .bind(from_user_id.to_string())
        .bind(to_user_id.to_string())
        .bind(now)
        .execute(&self.pool)
        .await;

        if let Err(sqlx::Error::Database(ref db_err)) = result {
            if db_err.is_unique_violation() {
                let existing = self
                    .get_by_group(group_id)
                    .await?
                    .ok_or(DbError::NotFound)?;
                return Err(DbError::Conflict(existing.id.to_string()));
            }
        }
        result?;

        Ok(OwnershipTransfer {
            id,
            group_id,
            from_user_id,
            to_user_id,
            created_at: now,
        })
    }

    async fn get_by_group(&self, group_id: Uuid) -> DbResult<Option<OwnershipTransfer>> {
        let row = sqlx::query(
            "SELECT id, group_id, from_user_id, to_user_id, created_at FROM ownership_transfers WHERE group_id = ?",
        )
        .bind(group_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_transfer).transpose()
    }

    async fn delete(&self, id: Uuid) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM ownership_transfers WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn delete_by_group_and_recipient(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> DbResult<()> {
        sqlx::query("DELETE FROM ownership_transfers WHERE group_id = ? AND to_user_id = ?")
            .bind(group_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn accept(&self, transfer: &OwnershipTransfer) -> DbResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE conversation_memberships SET access_level = 'manager', updated_at = ? WHERE group_id = ? AND user_id = ?",
        )
        .bind(now)
        .bind(transfer.group_id.to_string())
        .bind(transfer.from_user_id.to_string())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO conversation_memberships (group_id, user_id, access_level, created_at, updated_at)
            VALUES (?, ?, 'owner', ?, ?)
            ON CONFLICT (group_id, user_id) DO UPDATE SET access_level = 'owner', updated_at = excluded.updated_at
            "#,
        )
        .bind(transfer.group_id.to_string())
        .bind(transfer.to_user_id.to_string())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE conversations SET owner_user_id = ?, updated_at = ? WHERE group_id = ? AND deleted_at IS NULL",
        )
        .bind(transfer.to_user_id.to_string())
        .bind(now)
        .bind(transfer.group_id.to_string())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM ownership_transfers WHERE id = ?")
            .bind(transfer.id.to_string())
            .execute(&mut *tx)
            .await?;

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
            CREATE TABLE ownership_transfers (
                id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL UNIQUE,
                from_user_id TEXT NOT NULL,
                to_user_id TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            r#"
            CREATE TABLE conversation_memberships (
                group_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                access_level TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (group_id, user_id)
            );
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "CREATE TABLE conversations (id TEXT PRIMARY KEY, group_id TEXT, owner_user_id TEXT, updated_at TEXT, deleted_at TEXT)",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    #[tokio::test]
    async fn create_then_second_create_conflicts() {
        let pool = test_pool().await;
        let repo = SqliteTransferRepo::new(pool);
        let group_id = Uuid::new_v4();
        let from = Uuid::new_v4();
        let to = Uuid::new_v4();

        repo.create(group_id, from, to).await.unwrap();
        let result = repo.create(group_id, from, Uuid::new_v4()).await;
        assert!(matches!(result, Err(DbError::Conflict(_))));
    }

    #[tokio::test]
    async fn accept_promotes_new_owner_and_demotes_old() {
        let pool = test_pool().await;
        let group_id = Uuid::new_v4();
        let from = Uuid::new_v4();
        let to = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO conversation_memberships (group_id, user_id, access_level, created_at, updated_at) VALUES (?, ?, 'owner', ?, ?)",
        )
        .bind(group_id.to_string())
        .bind(from.to_string())
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(&pool)
        .await
        .unwrap();

        let repo = SqliteTransferRepo::new(pool.clone());
        let transfer = repo.create(group_id, from, to).await.unwrap();
        repo.accept(&transfer).await.unwrap();

        assert!(repo.get_by_group(group_id).await.unwrap().is_none());

        let new_owner_level: String = sqlx::query(
            "SELECT access_level FROM conversation_memberships WHERE group_id = ? AND user_id = ?",
        )
        .bind(group_id.to_string())
        .bind(to.to_string())
        .fetch_one(&pool)
        .await
        .unwrap()
        .get("access_level");
        assert_eq!(new_owner_level, "owner");
    }
}
