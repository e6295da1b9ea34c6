use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::db::error::{DbError, DbResult};
use crate::db::repos::{AttachmentRepo, NewAttachment};
use crate::models::attachment::Attachment;

pub struct PostgresAttachmentRepo {
    pool: PgPool,
}

impl PostgresAttachmentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_attachment(row: &sqlx::postgres::PgRow) -> DbResult<Attachment> {
        Ok(Attachment {
            id: row.get("id"),
            storage_key: row.get("storage_key"),
            filename: row.get("filename"),
            content_type: row.get("content_type"),
            size: row.get("size"),
            sha256: row.get("sha256"),
            user_id: row.get("user_id"),
            entry_id: row.get("entry_id"),
            expires_at: row.get("expires_at"),
            deleted_at: row.get("deleted_at"),
        })
    }
}

#[async_trait]
impl AttachmentRepo for PostgresAttachmentRepo {
    async fn create(&self, input: NewAttachment) -> DbResult<Attachment> {
        sqlx::query(
            r#"
            INSERT INTO attachments (
                id, storage_key, filename, content_type, size, sha256,
                user_id, entry_id, expires_at, deleted_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NULL)
            "#,
        )
        .bind(input.id)
        .bind(&input.storage_key)
        .bind(&input.filename)
        .bind(&input.content_type)
        .bind(input.size)
        .bind(&input.sha256)
        .bind(input.user_id)
        .bind(input.entry_id)
        .bind(input.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(Attachment {
            id: input.id,
            storage_key: input.storage_key,
            filename: input.filename,
            content_type: input.content_type,
            size: input.size,
            sha256: input.sha256,
            user_id: input.user_id,
            entry_id: input.entry_id,
            expires_at: input.expires_at,
            deleted_at: None,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Attachment>> {
        let row = sqlx::query(
            r#"
            SELECT id, storage_key, filename, content_type, size, sha256,
                   user_id, entry_id, expires_at, deleted_at
            FROM attachments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_attachment).transpose()
    }

    async fn list_by_entry(&self, entry_id: Uuid) -> DbResult<Vec<Attachment>> {
        let rows = sqlx::query(
            r#"
            SELECT id, storage_key, filename, content_type, size, sha256,
                   user_id, entry_id, expires_at, deleted_at
            FROM attachments
            WHERE entry_id = $1 AND deleted_at IS NULL
            ORDER BY id ASC
            "#,
        )
        .bind(entry_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_attachment).collect()
    }

    async fn soft_delete(&self, id: Uuid) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE attachments SET deleted_at = $1 WHERE id = $2 AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn hard_delete_by_group(&self, group_id: Uuid) -> DbResult<u64> {
        let result = sqlx::query(
            "DELETE FROM attachments WHERE entry_id IN (SELECT id FROM entries WHERE group_id = $1)",
        )
        .bind(group_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
