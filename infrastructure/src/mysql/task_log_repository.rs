use async_trait::async_trait;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

use taskman_core::{LogType, Result, TaskLog, TaskLogRepository, TaskManError, TaskStatus};

use super::db_err;

/// TaskLog 仓储 MySQL 实现（只追加）
pub struct MySqlTaskLogRepository {
    pool: MySqlPool,
}

impl MySqlTaskLogRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    fn row_to_log(row: &MySqlRow) -> Result<TaskLog> {
        let log_type_str: String = row.try_get("log_type").map_err(db_err)?;
        let log_type = match log_type_str.as_str() {
            "STATE_CHANGE" => LogType::StateChange,
            "RETRY" => LogType::Retry,
            "ERROR" => LogType::Error,
            "INFO" => LogType::Info,
            other => {
                return Err(TaskManError::Database(format!("未知日志类型: {other}")));
            }
        };

        let from_status: Option<String> = row.try_get("from_status").map_err(db_err)?;
        let to_status: Option<String> = row.try_get("to_status").map_err(db_err)?;
        let message: Option<String> = row.try_get("message").map_err(db_err)?;
        let worker_id: Option<String> = row.try_get("worker_id").map_err(db_err)?;
        let error_detail: Option<String> = row.try_get("error_detail").map_err(db_err)?;

        Ok(TaskLog {
            id: row.try_get("id").map_err(db_err)?,
            task_id: row.try_get("task_id").map_err(db_err)?,
            log_type,
            from_status: from_status.as_deref().and_then(TaskStatus::parse),
            to_status: to_status.as_deref().and_then(TaskStatus::parse),
            message: message.unwrap_or_default(),
            worker_id: worker_id.unwrap_or_default(),
            retry_count: row.try_get("retry_count").map_err(db_err)?,
            error_detail: error_detail.unwrap_or_default(),
            created_at: row.try_get("created_at").map_err(db_err)?,
        })
    }
}

#[async_trait]
impl TaskLogRepository for MySqlTaskLogRepository {
    async fn create(&self, log: &TaskLog) -> Result<()> {
        let query = "INSERT INTO task_log (task_id, log_type, from_status, to_status, message, \
             worker_id, retry_count, error_detail, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)";

        sqlx::query(query)
            .bind(&log.task_id)
            .bind(log.log_type.as_str())
            .bind(log.from_status.map(|s| s.as_str()))
            .bind(log.to_status.map(|s| s.as_str()))
            .bind(&log.message)
            .bind(&log.worker_id)
            .bind(log.retry_count)
            .bind(&log.error_detail)
            .bind(log.created_at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn get_by_task_id(&self, task_id: &str) -> Result<Vec<TaskLog>> {
        let query = "SELECT id, task_id, log_type, from_status, to_status, message, worker_id, \
             retry_count, error_detail, created_at \
             FROM task_log WHERE task_id = ? ORDER BY created_at ASC, id ASC";

        let rows = sqlx::query(query)
            .bind(task_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(Self::row_to_log).collect()
    }
}
