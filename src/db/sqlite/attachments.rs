use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::common::parse_uuid;
use crate::db::error::DbResult;
use crate::db::repos::{AttachmentRepo, NewAttachment};
use crate::models::attachment::Attachment;

pub struct SqliteAttachmentRepo {
    pool: SqlitePool,
}

impl SqliteAttachmentRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_attachment(row: &sqlx::sqlite::SqliteRow) -> DbResult<Attachment> {
        let entry_id: Option<String> = row.get("entry_id");
        Ok(Attachment {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            storage_key: row.get("storage_key"),
            filename: row.get("filename"),
            content_type: row.get("content_type"),
            size: row.get("size"),
            sha256: row.get("sha256"),
            user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
            entry_id: entry_id.map(|s| parse_uuid(&s)).transpose()?,
            expires_at: row.get("expires_at"),
            deleted_at: row.get("deleted_at"),
        })
    }
}

#[async_trait]
impl AttachmentRepo for SqliteAttachmentRepo {
    async fn create(&self, input: NewAttachment) -> DbResult<Attachment> {
        sqlx::query(
            r#"
            INSERT INTO attachments (
                id, storage_key, filename, content_type, size, sha256,
                user_id, entry_id, expires_at, deleted_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL)
            "#,
        )
        .bind(input.id.to_string())
        .bind(&input.storage_key)
        .bind(&input.filename)
        .bind(&input.content_type)
        .bind(input.size)
        .bind(&input.sha256)
        .bind(input.user_id.to_string())
        .bind(input.entry_id.map(|id| id.to_string()))
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
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
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
            WHERE entry_id = ? AND deleted_at IS NULL
            ORDER BY id ASC
            "#,
        )
        .bind(entry_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_attachment).collect()
    }

    async fn soft_delete(&self, id: Uuid) -> DbResult<()> {
        use crate::db::error::DbError;
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE attachments SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn hard_delete_by_group(&self, group_id: Uuid) -> DbResult<u64> {
        let result = sqlx::query(
            "DELETE FROM attachments WHERE entry_id IN (SELECT id FROM entries WHERE group_id = ?)",
        )
        .bind(group_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
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
            CREATE TABLE attachments (
                id TEXT PRIMARY KEY,
                storage_key TEXT NOT NULL,
                filename TEXT NOT NULL,
                content_type TEXT NOT NULL,
                size INTEGER NOT NULL,
                sha256 TEXT NOT NULL,
                user_id TEXT NOT NULL,
                entry_id TEXT,
                expires_at TEXT,
                deleted_at TEXT
            );
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("CREATE TABLE entries (id TEXT PRIMARY KEY, group_id TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    fn new_attachment(entry_id: Option<Uuid>) -> NewAttachment {
        NewAttachment {
            id: Uuid::new_v4(),
            storage_key: "s3://bucket/key".into(),
            filename: "file.png".into(),
            content_type: "image/png".into(),
            size: 1024,
            sha256: "abc123".into(),
            user_id: Uuid::new_v4(),
            entry_id,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let pool = test_pool().await;
        let repo = SqliteAttachmentRepo::new(pool);
        let created = repo.create(new_attachment(None)).await.unwrap();

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.filename, "file.png");
    }

    #[tokio::test]
    async fn soft_delete_excludes_from_list_by_entry() {
        let pool = test_pool().await;
        let entry_id = Uuid::new_v4();
        sqlx::query("INSERT INTO entries (id, group_id) VALUES (?, ?)")
            .bind(entry_id.to_string())
            .bind(Uuid::new_v4().to_string())
            .execute(&pool)
            .await
            .unwrap();

        let repo = SqliteAttachmentRepo::new(pool);
        let created = repo.create(new_attachment(Some(entry_id))).await.unwrap();
        repo.soft_delete(created.id).await.unwrap();

        assert!(repo.list_by_entry(entry_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn hard_delete_by_group_removes_attachments_of_group_entries() {
        let pool = test_pool().await;
        let group_id = Uuid::new_v4();
        let entry_id = Uuid::new_v4();
        sqlx::query("INSERT INTO entries (id, group_id) VALUES (?, ?)")
            .bind(entry_id.to_string())
            .bind(group_id.to_string())
            .execute(&pool)
            .await
            .unwrap();

        let repo = SqliteAttachmentRepo::new(pool);
        repo.create(new_attachment(Some(entry_id))).await.unwrap();

        let deleted = repo.hard_delete_by_group(group_id).await.unwrap();
        assert_eq!(deleted, 1);
    }
}
