use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::db::error::{DbError, DbResult};
use crate::db::repos::entries::{EntryRepo, NewEntry};
use crate::models::entry::{Channel, EncryptedEntryRow};

pub struct PostgresEntryRepo {
    pool: PgPool,
}

impl PostgresEntryRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_entry(row: &sqlx::postgres::PgRow) -> DbResult<EncryptedEntryRow> {
        let channel_str: String = row.get("channel");
        Ok(EncryptedEntryRow {
            id: row.get("id"),
            conversation_id: row.get("conversation_id"),
            group_id: row.get("group_id"),
            user_id: row.get("user_id"),
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

    async fn insert_one<'e, E>(executor: E, entry: &NewEntry, created_at: DateTime<Utc>) -> DbResult<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO entries (
                id, conversation_id, group_id, user_id, client_id, channel, epoch,
                content_type, content_ciphertext, indexed_content, indexed_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NULL, $11)
            "#,
        )
        .bind(entry.id)
        .bind(entry.conversation_id)
        .bind(entry.group_id)
        .bind(entry.user_id)
        .bind(&entry.client_id)
        .bind(entry.channel.as_str())
        .bind(entry.epoch)
        .bind(&entry.content_type)
        .bind(&entry.content_ciphertext)
        .bind(&entry.indexed_content)
        .bind(created_at)
        .execute(executor)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EntryRepo for PostgresEntryRepo {
    async fn insert(&self, entry: NewEntry) -> DbResult<EncryptedEntryRow> {
        let now = Utc::now();
        Self::insert_one(&self.pool, &entry, now).await?;
        self.get_by_id(entry.id, entry.group_id)
            .await?
            .ok_or(DbError::Internal("insert did not persist entry".into()))
    }

    async fn insert_batch(&self, entries: Vec<NewEntry>) -> DbResult<Vec<EncryptedEntryRow>> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let mut ids = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let created_at = now + chrono::Duration::microseconds(i as i64);
            Self::insert_one(&mut *tx, entry, created_at).await?;
            ids.push((entry.id, entry.group_id));
        }
        tx.commit().await?;

        let mut out = Vec::with_capacity(ids.len());
        for (id, group_id) in ids {
            out.push(
                self.get_by_id(id, group_id)
                    .await?
                    .ok_or(DbError::Internal("batch insert did not persist entry".into()))?,
            );
        }
        Ok(out)
    }

    async fn list_by_group_ordered(&self, group_id: Uuid) -> DbResult<Vec<EncryptedEntryRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, group_id, user_id, client_id, channel, epoch,
                   content_type, content_ciphertext, indexed_content, indexed_at, created_at
            FROM entries
            WHERE group_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(group_id)
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
            WHERE id = $1 AND group_id = $2
            "#,
        )
        .bind(id)
        .bind(group_id)
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
            WHERE group_id = $1 AND channel = 'HISTORY' AND indexed_content IS NULL
            ORDER BY created_at ASC, id ASC
            LIMIT $2
            "#,
        )
        .bind(group_id)
        .bind(limit as i64)
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
            ORDER BY created_at ASC, id ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
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
            "UPDATE entries SET indexed_content = $1 WHERE id = $2 AND group_id = $3",
        )
        .bind(indexed_content)
        .bind(entry_id)
        .bind(group_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn set_indexed_at(&self, entry_id: Uuid, group_id: Uuid, ts: DateTime<Utc>) -> DbResult<()> {
        let result = sqlx::query("UPDATE entries SET indexed_at = $1 WHERE id = $2 AND group_id = $3")
            .bind(ts)
            .bind(entry_id)
            .bind(group_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}
