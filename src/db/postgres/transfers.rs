use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::db::error::{DbError, DbResult};
use crate::db::repos::TransferRepo;
use crate::models::transfer::OwnershipTransfer;

pub struct PostgresTransferRepo {
    pool: PgPool,
}

impl PostgresTransferRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_transfer(row: &sqlx::postgres::PgRow) -> DbResult<OwnershipTransfer> {
        Ok(OwnershipTransfer {
            id: row.get("id"),
            group_id: row.get("group_id"),
            from_user_id: row.get("from_user_id"),
            to_user_id: row.get("to_user_id"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl TransferRepo for PostgresTransferRepo {
    async fn create(
        &self,
        group_id: Uuid,
        from_user_id: Uuid,
        to_user_id: Uuid,
    ) -> DbResult<OwnershipTransfer> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO ownership_transfers (id, group_id, from_user_id, to_user_id, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(group_id)
        .bind(from_user_id)
        .bind(to_user_id)
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
            "SELECT id, group_id, from_user_id, to_user_id, created_at FROM ownership_transfers WHERE group_id = $1",
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_transfer).transpose()
    }

    async fn delete(&self, id: Uuid) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM ownership_transfers WHERE id = $1")
            .bind(id)
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
        sqlx::query("DELETE FROM ownership_transfers WHERE group_id = $1 AND to_user_id = $2")
            .bind(group_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn accept(&self, transfer: &OwnershipTransfer) -> DbResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE conversation_memberships SET access_level = 'manager', updated_at = $1 WHERE group_id = $2 AND user_id = $3",
        )
        .bind(now)
        .bind(transfer.group_id)
        .bind(transfer.from_user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO conversation_memberships (group_id, user_id, access_level, created_at, updated_at)
            VALUES ($1, $2, 'owner', $3, $4)
            ON CONFLICT (group_id, user_id) DO UPDATE SET access_level = 'owner', updated_at = excluded.updated_at
            "#,
        )
        .bind(transfer.group_id)
        .bind(transfer.to_user_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE conversations SET owner_user_id = $1, updated_at = $2 WHERE group_id = $3 AND deleted_at IS NULL",
        )
        .bind(transfer.to_user_id)
        .bind(now)
        .bind(transfer.group_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM ownership_transfers WHERE id = $1")
            .bind(transfer.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
