use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::common::parse_uuid;
use crate::db::error::{DbError, DbResult};
use crate::db::repos::TaskRepo;
use crate::models::task::{CreateTask, Task};

pub struct SqliteTaskRepo {
    pool: SqlitePool,
}

impl SqliteTaskRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> DbResult<Task> {
        let body_json: String = row.get("body");
        Ok(Task {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            task_type: row.get("task_type"),
            task_name: row.get("task_name"),
            body: serde_json::from_str(&body_json).map_err(|e| DbError::Internal(e.to_string()))?,
            retry_at: row.get("retry_at"),
            retry_count: row.get("retry_count"),
            last_error: row.get("last_error"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl TaskRepo for SqliteTaskRepo {
    async fn create(&self, input: CreateTask) -> DbResult<Task> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let body_json =
            serde_json::to_string(&input.body).map_err(|e| DbError::Internal(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO tasks (id, task_type, task_name, body, retry_at, retry_count, last_error, created_at)
            VALUES (?, ?, ?, ?, ?, 0, NULL, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&input.task_type)
        .bind(&input.task_name)
        .bind(&body_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        if let Err(sqlx::Error::Database(ref db_err)) = result
            && db_err.is_unique_violation()
            && let Some(task_name) = &input.task_name
        {
            let existing = sqlx::query(
                "SELECT id, task_type, task_name, body, retry_at, retry_count, last_error, created_at FROM tasks WHERE task_name = ?",
            )
            .bind(task_name)
            .fetch_one(&self.pool)
            .await?;
            return Self::row_to_task(&existing);
        }
        result?;

        Ok(Task {
            id,
            task_type: input.task_type,
            task_name: input.task_name,
            body: input.body,
            retry_at: now,
            retry_count: 0,
            last_error: None,
            created_at: now,
        })
    }

    async fn claim_ready(&self, limit: u32) -> DbResult<Vec<Task>> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let rows = sqlx::query(
            r#"
            SELECT id, task_type, task_name, body, retry_at, retry_count, last_error, created_at
            FROM tasks
            WHERE retry_at <= ?
            ORDER BY retry_at ASC
            LIMIT ?
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        let tasks = rows.iter().map(Self::row_to_task).collect::<DbResult<Vec<_>>>()?;

        // Push claimed rows out of the ready window so a concurrent claim
        // doesn't see them again until they're explicitly re-scheduled.
        for task in &tasks {
            sqlx::query("UPDATE tasks SET retry_at = ? WHERE id = ?")
                .bind(now + chrono::Duration::hours(1))
                .bind(task.id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(tasks)
    }

    async fn succeed(&self, id: Uuid) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn fail(&self, id: Uuid, error: String, retry_at: DateTime<Utc>) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE tasks SET retry_count = retry_count + 1, last_error = ?, retry_at = ? WHERE id = ?",
        )
        .bind(error)
        .bind(retry_at)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
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
            CREATE TABLE tasks (
                id TEXT PRIMARY KEY,
                task_type TEXT NOT NULL,
                task_name TEXT UNIQUE,
                body TEXT NOT NULL,
                retry_at TEXT NOT NULL,
                retry_count INTEGER NOT NULL,
                last_error TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    fn task(name: Option<&str>) -> CreateTask {
        CreateTask {
            task_type: "vector_index".into(),
            body: serde_json::json!({"entryId": "abc"}),
            task_name: name.map(|s| s.to_string()),
        }
    }

    #[tokio::test]
    async fn create_is_idempotent_by_name() {
        let pool = test_pool().await;
        let repo = SqliteTaskRepo::new(pool);
        let a = repo.create(task(Some("idx:entry-1"))).await.unwrap();
        let b = repo.create(task(Some("idx:entry-1"))).await.unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn claim_ready_then_succeed_removes_task() {
        let pool = test_pool().await;
        let repo = SqliteTaskRepo::new(pool);
        let created = repo.create(task(None)).await.unwrap();

        let claimed = repo.claim_ready(10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, created.id);

        // not claimable again immediately
        assert!(repo.claim_ready(10).await.unwrap().is_empty());

        repo.succeed(created.id).await.unwrap();
    }

    #[tokio::test]
    async fn fail_increments_retry_count() {
        let pool = test_pool().await;
        let repo = SqliteTaskRepo::new(pool);
        let created = repo.create(task(None)).await.unwrap();

        repo.fail(created.id, "boom".into(), Utc::now()).await.unwrap();
        let claimed = repo.claim_ready(10).await.unwrap();
        assert_eq!(claimed[0].retry_count, 1);
        assert_eq!(claimed[0].last_error.as_deref(), Some("boom"));
    }
}
