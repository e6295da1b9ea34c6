use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::db::error::{DbError, DbResult};
use crate::db::repos::MembershipRepo;
use crate::models::membership::{AccessLevel, ConversationMembership};

pub struct PostgresMembershipRepo {
    pool: PgPool,
}

impl PostgresMembershipRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_membership(row: &sqlx::postgres::PgRow) -> DbResult<ConversationMembership> {
        let access_level_str: String = row.get("access_level");
        Ok(ConversationMembership {
            group_id: row.get("group_id"),
            user_id: row.get("user_id"),
            access_level: AccessLevel::from_str(&access_level_str).map_err(DbError::Internal)?,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl MembershipRepo for PostgresMembershipRepo {
    async fn add(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        access_level: AccessLevel,
    ) -> DbResult<ConversationMembership> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO conversation_memberships (group_id, user_id, access_level, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .bind(access_level.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(ConversationMembership {
            group_id,
            user_id,
            access_level,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get(&self, group_id: Uuid, user_id: Uuid) -> DbResult<Option<ConversationMembership>> {
        let row = sqlx::query(
            "SELECT group_id, user_id, access_level, created_at, updated_at FROM conversation_memberships WHERE group_id = $1 AND user_id = $2",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_membership).transpose()
    }

    async fn update(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        access_level: AccessLevel,
    ) -> DbResult<ConversationMembership> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE conversation_memberships SET access_level = $1, updated_at = $2 WHERE group_id = $3 AND user_id = $4",
        )
        .bind(access_level.as_str())
        .bind(now)
        .bind(group_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        self.get(group_id, user_id).await?.ok_or(DbError::NotFound)
    }

    async fn remove(&self, group_id: Uuid, user_id: Uuid) -> DbResult<()> {
        let result = sqlx::query(
            "DELETE FROM conversation_memberships WHERE group_id = $1 AND user_id = $2 AND access_level != 'owner'",
        )
        .bind(group_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn list_by_group(&self, group_id: Uuid) -> DbResult<Vec<ConversationMembership>> {
        let rows = sqlx::query(
            "SELECT group_id, user_id, access_level, created_at, updated_at FROM conversation_memberships WHERE group_id = $1 ORDER BY created_at ASC",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_membership).collect()
    }

    async fn get_owner(&self, group_id: Uuid) -> DbResult<Option<ConversationMembership>> {
        let row = sqlx::query(
            "SELECT group_id, user_id, access_level, created_at, updated_at FROM conversation_memberships WHERE group_id = $1 AND access_level = 'owner'",
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_membership).transpose()
    }

    async fn remove_all_for_group(&self, group_id: Uuid) -> DbResult<Vec<ConversationMembership>> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            "SELECT group_id, user_id, access_level, created_at, updated_at FROM conversation_memberships WHERE group_id = $1",
        )
        .bind(group_id)
        .fetch_all(&mut *tx)
        .await?;

        let removed = rows
            .iter()
            .map(Self::row_to_membership)
            .collect::<DbResult<Vec<_>>>()?;

        sqlx::query("DELETE FROM conversation_memberships WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(removed)
    }
}
