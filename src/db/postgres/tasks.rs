use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::db::error::{DbError, DbResult};
use crate::db::repos::TaskRepo;
use crate::models::task::{CreateTask, Task};

pub struct PostgresTaskRepo {
    pool: PgPool,
}

impl PostgresTaskRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: &sqlx::postgres::PgRow) -> DbResult<Task> {
        Ok(Task {
            id: row.get("id"),
            task_type: row.get("task_type"),
            task_name: row.get("task_name"),
            body: row.get("body"),
            retry_at: row.get("retry_at"),
            retry_count: row.get("retry_count"),
            last_error: row.get("last_error"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl TaskRepo for PostgresTaskRepo {
    async fn create(&self, input: CreateTask) -> DbResult<Task> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO tasks (id, task_type, task_name, body, retry_at, retry_count, last_error, created_at)
            VALUES ($1, $2, $3, $4, $5, 0, NULL, $6)
            "#,
        )
        .bind(id)
        .bind(&input.task_type)
        .bind(&input.task_name)
        .bind(&input.body)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        if let Err(sqlx::Error::Database(ref db_err)) = result
            && db_err.is_unique_violation()
            && let Some(task_name) = &input.task_name
        {
            let existing = sqlx::query(
                "SELECT id, task_type, task_name, body, retry_at, retry_count, last_error, created_at FROM tasks WHERE task_name = $1",
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
            WHERE retry_at <= $1
            ORDER BY retry_at ASC
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&mut *tx)
        .await?;

        let tasks = rows.iter().map(Self::row_to_task).collect::<DbResult<Vec<_>>>()?;

        for task in &tasks {
            sqlx::query("UPDATE tasks SET retry_at = $1 WHERE id = $2")
                .bind(now + chrono::Duration::hours(1))
                .bind(task.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(tasks)
    }

    async fn succeed(&self, id: Uuid) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn fail(&self, id: Uuid, error: String, retry_at: DateTime<Utc>) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE tasks SET retry_count = retry_count + 1, last_error = $1, retry_at = $2 WHERE id = $3",
        )
        .bind(error)
        .bind(retry_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}
