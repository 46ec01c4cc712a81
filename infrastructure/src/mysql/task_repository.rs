use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::types::Json;
use sqlx::{MySqlPool, Row};

use taskman_core::{
    JsonMap, Result, Task, TaskManError, TaskPriority, TaskRepository, TaskStatus,
};

use super::db_err;

const SELECT_COLUMNS: &str = "id, task_id, task_type, priority, status, payload, result, \
     error_message, worker_id, retry_count, max_retry, timeout, scheduled_at, created_at, \
     updated_at, started_at, completed_at";

/// Task 仓储 MySQL 实现
///
/// 终态单调性由条件 UPDATE 保证：已到终态的行不再被任何更新命中，
/// 命中零行且行存在时返回非法状态迁移。
pub struct MySqlTaskRepository {
    pool: MySqlPool,
}

impl MySqlTaskRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: &MySqlRow) -> Result<Task> {
        let status_str: String = row.try_get("status").map_err(db_err)?;
        let status = TaskStatus::parse(&status_str)
            .ok_or_else(|| TaskManError::Database(format!("未知任务状态: {status_str}")))?;

        let payload: Json<JsonMap> = row.try_get("payload").map_err(db_err)?;
        let result: Option<Json<JsonMap>> = row.try_get("result").map_err(db_err)?;
        let error_msg: Option<String> = row.try_get("error_message").map_err(db_err)?;
        let worker_id: Option<String> = row.try_get("worker_id").map_err(db_err)?;
        let started_at: Option<DateTime<Utc>> = row.try_get("started_at").map_err(db_err)?;
        let completed_at: Option<DateTime<Utc>> = row.try_get("completed_at").map_err(db_err)?;

        Ok(Task {
            id: row.try_get("id").map_err(db_err)?,
            task_id: row.try_get("task_id").map_err(db_err)?,
            task_type: row.try_get("task_type").map_err(db_err)?,
            priority: TaskPriority::from_value(row.try_get("priority").map_err(db_err)?),
            status,
            payload: payload.0,
            result: result.map(|r| r.0).unwrap_or_default(),
            error_msg: error_msg.unwrap_or_default(),
            retry_count: row.try_get("retry_count").map_err(db_err)?,
            max_retry: row.try_get("max_retry").map_err(db_err)?,
            timeout_seconds: row.try_get("timeout").map_err(db_err)?,
            worker_id: worker_id.unwrap_or_default(),
            scheduled_at: row.try_get("scheduled_at").map_err(db_err)?,
            started_at,
            completed_at,
            created_at: row.try_get("created_at").map_err(db_err)?,
            updated_at: row.try_get("updated_at").map_err(db_err)?,
        })
    }

    fn rows_to_tasks(rows: Vec<MySqlRow>) -> Result<Vec<Task>> {
        rows.iter().map(Self::row_to_task).collect()
    }
}

#[async_trait]
impl TaskRepository for MySqlTaskRepository {
    async fn create(&self, task: &Task) -> Result<()> {
        let query = "INSERT INTO task (task_id, task_type, priority, status, payload, \
             retry_count, max_retry, timeout, scheduled_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

        let result = sqlx::query(query)
            .bind(&task.task_id)
            .bind(&task.task_type)
            .bind(task.priority.value())
            .bind(task.status.as_str())
            .bind(Json(&task.payload))
            .bind(task.retry_count)
            .bind(task.max_retry)
            .bind(task.timeout_seconds)
            .bind(task.scheduled_at)
            .bind(task.created_at)
            .bind(Utc::now())
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                TaskManError::conflict(format!("task already exists: {}", task.task_id)),
            ),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn get_by_id(&self, task_id: &str) -> Result<Task> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM task WHERE task_id = ?");
        let row = sqlx::query(&query)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| TaskManError::task_not_found(task_id))?;
        Self::row_to_task(&row)
    }

    async fn update(&self, task: &Task) -> Result<()> {
        // 终态行被 WHERE 条件排除，超时扫描与 Worker 上报的竞争在此仲裁
        let query = "UPDATE task SET status = ?, result = ?, error_message = ?, worker_id = ?, \
             retry_count = ?, scheduled_at = ?, started_at = ?, completed_at = ?, updated_at = ? \
             WHERE task_id = ? \
               AND NOT (status IN ('SUCCESS', 'CANCELLED') \
                    OR (status IN ('FAILED', 'TIMEOUT') AND retry_count >= max_retry))";

        let result = sqlx::query(query)
            .bind(task.status.as_str())
            .bind(Json(&task.result))
            .bind(&task.error_msg)
            .bind(&task.worker_id)
            .bind(task.retry_count)
            .bind(task.scheduled_at)
            .bind(task.started_at)
            .bind(task.completed_at)
            .bind(Utc::now())
            .bind(&task.task_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM task WHERE task_id = ?")
                .bind(&task.task_id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;
            if exists > 0 {
                return Err(TaskManError::InvalidStateTransition {
                    task_id: task.task_id.clone(),
                });
            }
            return Err(TaskManError::task_not_found(&task.task_id));
        }
        Ok(())
    }

    async fn delete(&self, task_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM task WHERE task_id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn find_pending_tasks(&self, limit: i64) -> Result<Vec<Task>> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM task WHERE status = 'PENDING' AND scheduled_at <= ? \
             ORDER BY priority DESC, created_at ASC LIMIT ?"
        );
        let rows = sqlx::query(&query)
            .bind(Utc::now())
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Self::rows_to_tasks(rows)
    }

    async fn find_processing_tasks(&self) -> Result<Vec<Task>> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM task WHERE status = 'PROCESSING'");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Self::rows_to_tasks(rows)
    }

    async fn find_timeout_tasks(&self) -> Result<Vec<Task>> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM task WHERE status = 'PROCESSING' \
             AND started_at IS NOT NULL \
             AND TIMESTAMPDIFF(SECOND, started_at, NOW(6)) > timeout"
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Self::rows_to_tasks(rows)
    }

    async fn find_by_status(&self, status: TaskStatus, limit: i64) -> Result<Vec<Task>> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM task WHERE status = ? ORDER BY created_at DESC LIMIT ?"
        );
        let rows = sqlx::query(&query)
            .bind(status.as_str())
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Self::rows_to_tasks(rows)
    }
}
