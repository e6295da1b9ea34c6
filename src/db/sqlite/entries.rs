use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::common::parse_uuid;
use crate::db::error::{DbError, DbResult};
use crate::db::repos::{EntryRepo, NewEntry};
use crate::models::entry::{Channel, EncryptedEntryRow};

pub struct SqliteEntryRepo {
    pool: SqlitePool,
}

impl SqliteEntryRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> DbResult<EncryptedEntryRow> {
        let channel_str: String = row.get("channel");
        let user_id: Option<String> = row.get("user_id");
        Ok(EncryptedEntryRow {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            conversation_id: parse_uuid(&row.get::<String, _>("conversation_id"))?,
            group_id: parse_uuid(&row.get::<String, _>("group_id"))?,
            user_id: user_id.map(|s| parse_uuid(&s)).transpose()?,
            client_id: row.get("client_id"),
            channel: Channel::from_str(&channel_str).map_err(DbError::Internal)?,
            epoch: row.get("epoch"),
            content_type: row.get("content_type"),
            content_ciphertext: row.get("content_ciphertext"),
            indexed_content: row.get("indexed_content"),
            indexed_at: row.get("indexed_at"),
            created_at: row.get("created_at"),
        })
    }

    async fn insert_one<'e, E>(
        executor: E,
        entry: NewEntry,
        now: DateTime<Utc>,
    ) -> DbResult<EncryptedEntryRow>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let id = entry.id;
        sqlx::query(
            r#"
            INSERT INTO entries (
                id, conversation_id, group_id, user_id, client_id, channel, epoch,
                content_type, content_ciphertext, indexed_content, indexed_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(entry.conversation_id.to_string())
        .bind(entry.group_id.to_string())
        .bind(entry.user_id.map(|u| u.to_string()))
        .bind(&entry.client_id)
        .bind(entry.channel.as_str())
        .bind(entry.epoch)
        .bind(&entry.content_type)
        .bind(&entry.content_ciphertext)
        .bind(&entry.indexed_content)
        .bind(now)
        .execute(executor)
        .await?;

        Ok(EncryptedEntryRow {
            id,
            conversation_id: entry.conversation_id,
            group_id: entry.group_id,
            user_id: entry.user_id,
            client_id: entry.client_id,
            channel: entry.channel,
            epoch: entry.epoch,
            content_type: entry.content_type,
            content_ciphertext: entry.content_ciphertext,
            indexed_content: entry.indexed_content,
            indexed_at: None,
            created_at: now,
        })
    }
}

#[async_trait]
impl EntryRepo for SqliteEntryRepo {
    async fn insert(&self, entry: NewEntry) -> DbResult<EncryptedEntryRow> {
        let now = Utc::now();
        Self::insert_one(&self.pool, entry, now).await
    }

    async fn insert_batch(&self, entries: Vec<NewEntry>) -> DbResult<Vec<EncryptedEntryRow>> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(entries.len());
        for entry in entries {
            let now = Utc::now();
            inserted.push(Self::insert_one(&mut *tx, entry, now).await?);
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn list_by_group_ordered(&self, group_id: Uuid) -> DbResult<Vec<EncryptedEntryRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, group_id, user_id, client_id, channel, epoch,
                   content_type, content_ciphertext, indexed_content, indexed_at, created_at
            FROM entries
            WHERE group_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(group_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    async fn get_by_id(&self, id: Uuid, group_id: Uuid) -> DbResult<Option<EncryptedEntryRow>> {
        let row = sqlx::query(
            r#"
            SELECT id, conversation_id, group_id, user_id, client_id, channel, epoch,
                   content_type, content_ciphertext, indexed_content, indexed_at, created_at
            FROM entries
            WHERE id = ? AND group_id = ?
            "#,
        )
        .bind(id.to_string())
        .bind(group_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_entry).transpose()
    }

    async fn list_unindexed(&self, group_id: Uuid, limit: u32) -> DbResult<Vec<EncryptedEntryRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, group_id, user_id, client_id, channel, epoch,
                   content_type, content_ciphertext, indexed_content, indexed_at, created_at
            FROM entries
            WHERE group_id = ? AND channel = 'HISTORY' AND indexed_content IS NULL
            ORDER BY created_at ASC
            LIMIT ?
            "#,
        )
        .bind(group_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    async fn find_pending_vector_indexing(&self, limit: u32) -> DbResult<Vec<EncryptedEntryRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, group_id, user_id, client_id, channel, epoch,
                   content_type, content_ciphertext, indexed_content, indexed_at, created_at
            FROM entries
            WHERE indexed_content IS NOT NULL AND indexed_at IS NULL
            ORDER BY created_at ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    async fn set_indexed_content(
        &self,
        entry_id: Uuid,
        group_id: Uuid,
        indexed_content: String,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE entries SET indexed_content = ? WHERE id = ? AND group_id = ?",
        )
        .bind(indexed_content)
        .bind(entry_id.to_string())
        .bind(group_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn set_indexed_at(
        &self,
        entry_id: Uuid,
        group_id: Uuid,
        ts: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE entries SET indexed_at = ? WHERE id = ? AND group_id = ?",
        )
        .bind(ts)
        .bind(entry_id.to_string())
        .bind(group_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}
