use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::common::parse_uuid;
use crate::db::error::{DbError, DbResult};
use crate::db::repos::{
    ConversationRepo, ConversationUpdate, Cursor, CursorDirection, ListParams, ListResult,
    NewConversation, PageCursors,
};
use crate::models::conversation::{EncryptedConversationRow, ListConversationsMode};

pub struct SqliteConversationRepo {
    pool: SqlitePool,
}

impl SqliteConversationRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_metadata(json: String) -> DbResult<HashMap<String, serde_json::Value>> {
        serde_json::from_str(&json).map_err(|e| DbError::Internal(e.to_string()))
    }

    fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> DbResult<EncryptedConversationRow> {
        let metadata_json: String = row.get("metadata");
        let forked_at_conversation_id: Option<String> = row.get("forked_at_conversation_id");
        let forked_at_entry_id: Option<String> = row.get("forked_at_entry_id");

        Ok(EncryptedConversationRow {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            group_id: parse_uuid(&row.get::<String, _>("group_id"))?,
            owner_user_id: parse_uuid(&row.get::<String, _>("owner_user_id"))?,
            title_ciphertext: row.get("title_ciphertext"),
            metadata: Self::parse_metadata(metadata_json)?,
            forked_at_conversation_id: forked_at_conversation_id
                .map(|s| parse_uuid(&s))
                .transpose()?,
            forked_at_entry_id: forked_at_entry_id.map(|s| parse_uuid(&s)).transpose()?,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            deleted_at: row.get("deleted_at"),
        })
    }

    fn cursor_from_row(conv: &EncryptedConversationRow) -> Cursor {
        Cursor::new(conv.updated_at, conv.id)
    }

    async fn list_with_cursor(
        &self,
        user_id: Uuid,
        mode: ListConversationsMode,
        params: &ListParams,
        cursor: &Cursor,
        fetch_limit: i64,
        limit: i64,
    ) -> DbResult<ListResult<EncryptedConversationRow>> {
        let (comparison, order, should_reverse) =
            params.sort_order.cursor_query_params(params.direction);

        let deleted_filter = if params.include_deleted {
            ""
        } else {
            "AND c.deleted_at IS NULL"
        };

        let mode_filter = match mode {
            ListConversationsMode::All => "",
            ListConversationsMode::Roots => "AND c.forked_at_conversation_id IS NULL",
            ListConversationsMode::LatestFork => "",
        };

        let query = format!(
            r#"
            SELECT c.id, c.group_id, c.owner_user_id, c.title_ciphertext, c.metadata,
                   c.forked_at_conversation_id, c.forked_at_entry_id, c.created_at,
                   c.updated_at, c.deleted_at
            FROM conversations c
            JOIN conversation_memberships m ON m.group_id = c.group_id
            WHERE m.user_id = ?
            AND (c.updated_at, c.id) {comparison} (?, ?)
            {deleted_filter}
            {mode_filter}
            ORDER BY c.updated_at {order}, c.id {order}
            LIMIT ?
            "#,
        );

        let rows = sqlx::query(&query)
            .bind(user_id.to_string())
            .bind(cursor.created_at)
            .bind(cursor.id.to_string())
            .bind(fetch_limit)
            .fetch_all(&self.pool)
            .await?;

        let has_more = rows.len() as i64 > limit;
        let mut items = rows
            .iter()
            .take(limit as usize)
            .map(Self::row_to_conversation)
            .collect::<DbResult<Vec<_>>>()?;

        if should_reverse {
            items.reverse();
        }

        let cursors = PageCursors::from_items(
            &items,
            has_more,
            params.direction,
            Some(cursor),
            Self::cursor_from_row,
        );

        Ok(ListResult::new(items, has_more, cursors))
    }
}

#[async_trait]
impl ConversationRepo for SqliteConversationRepo {
    async fn create(&self, input: NewConversation) -> DbResult<EncryptedConversationRow> {
        let now = Utc::now();
        let metadata_json =
            serde_json::to_string(&input.metadata).map_err(|e| DbError::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO conversations (
                id, group_id, owner_user_id, title_ciphertext, metadata,
                forked_at_conversation_id, forked_at_entry_id, created_at, updated_at, deleted_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL)
            "#,
        )
        .bind(input.id.to_string())
        .bind(input.group_id.to_string())
        .bind(input.owner_user_id.to_string())
        .bind(&input.title_ciphertext)
        .bind(&metadata_json)
        .bind(input.forked_at_conversation_id.map(|id| id.to_string()))
        .bind(input.forked_at_entry_id.map(|id| id.to_string()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(EncryptedConversationRow {
            id: input.id,
            group_id: input.group_id,
            owner_user_id: input.owner_user_id,
            title_ciphertext: input.title_ciphertext,
            metadata: input
                .metadata
                .as_object()
                .map(|m| {
                    m.iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect::<HashMap<_, _>>()
                })
                .unwrap_or_default(),
            forked_at_conversation_id: input.forked_at_conversation_id,
            forked_at_entry_id: input.forked_at_entry_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<EncryptedConversationRow>> {
        let row = sqlx::query(
            r#"
            SELECT id, group_id, owner_user_id, title_ciphertext, metadata,
                   forked_at_conversation_id, forked_at_entry_id, created_at, updated_at, deleted_at
            FROM conversations
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_conversation).transpose()
    }

    async fn list_by_group(&self, group_id: Uuid) -> DbResult<Vec<EncryptedConversationRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, group_id, owner_user_id, title_ciphertext, metadata,
                   forked_at_conversation_id, forked_at_entry_id, created_at, updated_at, deleted_at
            FROM conversations
            WHERE group_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(group_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_conversation).collect()
    }

    async fn update(
        &self,
        id: Uuid,
        input: ConversationUpdate,
    ) -> DbResult<EncryptedConversationRow> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query(
            r#"
            SELECT id, group_id, owner_user_id, title_ciphertext, metadata,
                   forked_at_conversation_id, forked_at_entry_id, created_at, updated_at, deleted_at
            FROM conversations
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        let mut current = Self::row_to_conversation(&current)?;

        if let Some(title_ciphertext) = input.title_ciphertext {
            current.title_ciphertext = title_ciphertext;
        }
        if let Some(metadata) = input.metadata {
            current.metadata = metadata
                .as_object()
                .map(|m| {
                    m.iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect::<HashMap<_, _>>()
                })
                .unwrap_or_default();
        }
        let metadata_json = serde_json::to_string(&current.metadata)
            .map_err(|e| DbError::Internal(e.to_string()))?;

        sqlx::query(
            "UPDATE conversations SET title_ciphertext = ?, metadata = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&current.title_ciphertext)
        .bind(&metadata_json)
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        current.updated_at = now;
        Ok(current)
    }

    async fn soft_delete(&self, id: Uuid) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE conversations SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL",
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

    async fn list_for_user(
        &self,
        user_id: Uuid,
        mode: ListConversationsMode,
        params: ListParams,
    ) -> DbResult<ListResult<EncryptedConversationRow>> {
        let limit = params.limit.unwrap_or(50).clamp(1, 200);
        let fetch_limit = limit + 1;

        let cursor = match &params.cursor {
            Some(c) => c.clone(),
            None => {
                let now = Utc::now();
                Cursor::new(now, Uuid::max())
            }
        };

        self.list_with_cursor(user_id, mode, &params, &cursor, fetch_limit, limit)
            .await
    }

    async fn set_owner_for_group(&self, group_id: Uuid, owner_user_id: Uuid) -> DbResult<()> {
        sqlx::query(
            "UPDATE conversations SET owner_user_id = ?, updated_at = ? WHERE group_id = ? AND deleted_at IS NULL",
        )
        .bind(owner_user_id.to_string())
        .bind(Utc::now())
        .bind(group_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn hard_delete_soft_deleted_before(
        &self,
        cutoff: DateTime<Utc>,
        batch_size: u32,
        max_deletes: u64,
    ) -> DbResult<u64> {
        let mut total = 0u64;
        loop {
            if total >= max_deletes {
                break;
            }
            let limit = batch_size.min((max_deletes - total) as u32);
            let result = sqlx::query(
                r#"
                DELETE FROM conversations
                WHERE id IN (
                    SELECT id FROM conversations
                    WHERE deleted_at IS NOT NULL AND deleted_at < ?
                    LIMIT ?
                )
                "#,
            )
            .bind(cutoff)
            .bind(limit)
            .execute(&self.pool)
            .await?;

            let deleted = result.rows_affected();
            total += deleted;
            if deleted < limit as u64 {
                break;
            }
        }
        Ok(total)
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
            CREATE TABLE conversations (
                id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL,
                owner_user_id TEXT NOT NULL,
                title_ciphertext BLOB NOT NULL,
                metadata TEXT NOT NULL,
                forked_at_conversation_id TEXT,
                forked_at_entry_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT
            );
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "CREATE TABLE conversation_memberships (group_id TEXT NOT NULL, user_id TEXT NOT NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    fn new_conv(group_id: Uuid, owner: Uuid) -> NewConversation {
        NewConversation {
            id: Uuid::new_v4(),
            group_id,
            owner_user_id: owner,
            title_ciphertext: b"ciphertext".to_vec(),
            metadata: serde_json::json!({}),
            forked_at_conversation_id: None,
            forked_at_entry_id: None,
        }
    }

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepo::new(pool);
        let group_id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let created = repo.create(new_conv(group_id, owner)).await.unwrap();

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.owner_user_id, owner);
        assert_eq!(fetched.title_ciphertext, b"ciphertext".to_vec());
    }

    #[tokio::test]
    async fn soft_delete_then_update_is_not_found() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepo::new(pool);
        let group_id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let created = repo.create(new_conv(group_id, owner)).await.unwrap();

        repo.soft_delete(created.id).await.unwrap();
        let result = repo
            .update(created.id, ConversationUpdate::default())
            .await;
        assert!(matches!(result, Err(DbError::NotFound)));
    }

    #[tokio::test]
    async fn list_by_group_orders_by_created_at() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepo::new(pool);
        let group_id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        repo.create(new_conv(group_id, owner)).await.unwrap();
        repo.create(new_conv(group_id, owner)).await.unwrap();

        let all = repo.list_by_group(group_id).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
