use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::db::error::{DbError, DbResult};
use crate::db::repos::{
    ConversationRepo, ConversationUpdate, Cursor, CursorDirection, ListParams, ListResult,
    NewConversation, PageCursors,
};
use crate::models::conversation::{EncryptedConversationRow, ListConversationsMode};

pub struct PostgresConversationRepo {
    pool: PgPool,
}

impl PostgresConversationRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_conversation(row: &sqlx::postgres::PgRow) -> DbResult<EncryptedConversationRow> {
        let metadata: serde_json::Value = row.get("metadata");
        Ok(EncryptedConversationRow {
            id: row.get("id"),
            group_id: row.get("group_id"),
            owner_user_id: row.get("owner_user_id"),
            title_ciphertext: row.get("title_ciphertext"),
            metadata: metadata
                .as_object()
                .map(|m| {
                    m.iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect::<HashMap<_, _>>()
                })
                .unwrap_or_default(),
            forked_at_conversation_id: row.get("forked_at_conversation_id"),
            forked_at_entry_id: row.get("forked_at_entry_id"),
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
            WHERE m.user_id = $1
            AND (c.updated_at, c.id) {comparison} ($2, $3)
            {deleted_filter}
            {mode_filter}
            ORDER BY c.updated_at {order}, c.id {order}
            LIMIT $4
            "#,
        );

        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(cursor.created_at)
            .bind(cursor.id)
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
impl ConversationRepo for PostgresConversationRepo {
    async fn create(&self, input: NewConversation) -> DbResult<EncryptedConversationRow> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO conversations (
                id, group_id, owner_user_id, title_ciphertext, metadata,
                forked_at_conversation_id, forked_at_entry_id, created_at, updated_at, deleted_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NULL)
            "#,
        )
        .bind(input.id)
        .bind(input.group_id)
        .bind(input.owner_user_id)
        .bind(&input.title_ciphertext)
        .bind(&input.metadata)
        .bind(input.forked_at_conversation_id)
        .bind(input.forked_at_entry_id)
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
            WHERE id = $1
            "#,
        )
        .bind(id)
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
            WHERE group_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(group_id)
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
            WHERE id = $1 AND deleted_at IS NULL
            FOR UPDATE
            "#,
        )
        .bind(id)
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
        let metadata_json = serde_json::to_value(&current.metadata)
            .map_err(|e| DbError::Internal(e.to_string()))?;

        sqlx::query(
            "UPDATE conversations SET title_ciphertext = $1, metadata = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(&current.title_ciphertext)
        .bind(&metadata_json)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        current.updated_at = now;
        Ok(current)
    }

    async fn soft_delete(&self, id: Uuid) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE conversations SET deleted_at = $1 WHERE id = $2 AND deleted_at IS NULL",
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
            "UPDATE conversations SET owner_user_id = $1, updated_at = $2 WHERE group_id = $3 AND deleted_at IS NULL",
        )
        .bind(owner_user_id)
        .bind(Utc::now())
        .bind(group_id)
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
                    WHERE deleted_at IS NOT NULL AND deleted_at < $1
                    LIMIT $2
                )
                "#,
            )
            .bind(cutoff)
            .bind(limit as i64)
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
