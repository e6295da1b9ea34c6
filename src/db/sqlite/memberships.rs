use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::common::parse_uuid;
use crate::db::error::{DbError, DbResult};
use crate::db::repos::MembershipRepo;
use crate::models::membership::{AccessLevel, ConversationMembership};

pub struct SqliteMembershipRepo {
    pool: SqlitePool,
}

impl SqliteMembershipRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_membership(row: &sqlx::sqlite::SqliteRow) -> DbResult<ConversationMembership> {
        let access_level_str: String = row.get("access_level");
        Ok(ConversationMembership {
            group_id: parse_uuid(&row.get::<String, _>("group_id"))?,
            user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
            access_level: AccessLevel::from_str(&access_level_str)
                .map_err(DbError::Internal)?,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl MembershipRepo for SqliteMembershipRepo {
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
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(group_id.to_string())
        .bind(user_id.to_string())
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
            "SELECT group_id, user_id, access_level, created_at, updated_at FROM conversation_memberships WHERE group_id = ? AND user_id = ?",
        )
        .bind(group_id.to_string())
        .bind(user_id.to_string())
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
            "UPDATE conversation_memberships SET access_level = ?, updated_at = ? WHERE group_id = ? AND user_id = ?",
        )
        .bind(access_level.as_str())
        .bind(now)
        .bind(group_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        self.get(group_id, user_id).await?.ok_or(DbError::NotFound)
    }

    async fn remove(&self, group_id: Uuid, user_id: Uuid) -> DbResult<()> {
        let result = sqlx::query(
            "DELETE FROM conversation_memberships WHERE group_id = ? AND user_id = ? AND access_level != 'owner'",
        )
        .bind(group_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn list_by_group(&self, group_id: Uuid) -> DbResult<Vec<ConversationMembership>> {
        let rows = sqlx::query(
            "SELECT group_id, user_id, access_level, created_at, updated_at FROM conversation_memberships WHERE group_id = ? ORDER BY created_at ASC",
        )
        .bind(group_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_membership).collect()
    }

    async fn get_owner(&self, group_id: Uuid) -> DbResult<Option<ConversationMembership>> {
        let row = sqlx::query(
            "SELECT group_id, user_id, access_level, created_at, updated_at FROM conversation_memberships WHERE group_id = ? AND access_level = 'owner'",
        )
        .bind(group_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_membership).transpose()
    }

    async fn remove_all_for_group(&self, group_id: Uuid) -> DbResult<Vec<ConversationMembership>> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            "SELECT group_id, user_id, access_level, created_at, updated_at FROM conversation_memberships WHERE group_id = ?",
        )
        .bind(group_id.to_string())
        .fetch_all(&mut *tx)
        .await?;

        let removed = rows
            .iter()
            .map(Self::row_to_membership)
            .collect::<DbResult<Vec<_>>>()?;

        sqlx::query("DELETE FROM conversation_memberships WHERE group_id = ?")
            .bind(group_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(removed)
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
        pool
    }

    #[tokio::test]
    async fn add_get_update_roundtrip() {
        let pool = test_pool().await;
        let repo = SqliteMembershipRepo::new(pool);
        let group_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        repo.add(group_id, user_id, AccessLevel::Reader).await.unwrap();
        let fetched = repo.get(group_id, user_id).await.unwrap().unwrap();
        assert_eq!(fetched.access_level, AccessLevel::Reader);

        let updated = repo.update(group_id, user_id, AccessLevel::Writer).await.unwrap();
        assert_eq!(updated.access_level, AccessLevel::Writer);
    }

    #[tokio::test]
    async fn remove_refuses_owner() {
        let pool = test_pool().await;
        let repo = SqliteMembershipRepo::new(pool);
        let group_id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        repo.add(group_id, owner, AccessLevel::Owner).await.unwrap();

        let result = repo.remove(group_id, owner).await;
        assert!(matches!(result, Err(DbError::NotFound)));

        let still_there = repo.get(group_id, owner).await.unwrap();
        assert!(still_there.is_some());
    }

    #[tokio::test]
    async fn remove_all_for_group_returns_removed_rows() {
        let pool = test_pool().await;
        let repo = SqliteMembershipRepo::new(pool);
        let group_id = Uuid::new_v4();
        repo.add(group_id, Uuid::new_v4(), AccessLevel::Owner).await.unwrap();
        repo.add(group_id, Uuid::new_v4(), AccessLevel::Reader).await.unwrap();

        let removed = repo.remove_all_for_group(group_id).await.unwrap();
        assert_eq!(removed.len(), 2);
        assert!(repo.list_by_group(group_id).await.unwrap().is_empty());
    }
}
