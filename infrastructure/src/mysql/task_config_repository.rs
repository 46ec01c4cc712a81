use async_trait::async_trait;
use chrono::Utc;
use sqlx::mysql::MySqlRow;
use sqlx::types::Json;
use sqlx::{MySqlPool, Row};

use taskman_core::{
    ExecutorType, JsonMap, Result, RetryStrategy, TaskConfig, TaskConfigRepository, TaskManError,
};

use super::db_err;

const SELECT_COLUMNS: &str = "id, task_type, task_name, description, executor_type, \
     executor_config, default_timeout, default_max_retry, retry_strategy, retry_delay, \
     backoff_rate, max_concurrent, enabled, created_at, updated_at";

/// TaskConfig 仓储 MySQL 实现
pub struct MySqlTaskConfigRepository {
    pool: MySqlPool,
}

impl MySqlTaskConfigRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    fn row_to_config(row: &MySqlRow) -> Result<TaskConfig> {
        let executor_type_str: String = row.try_get("executor_type").map_err(db_err)?;
        let executor_type = match executor_type_str.as_str() {
            "LOCAL" => ExecutorType::Local,
            "HTTP" => ExecutorType::Http,
            other => {
                return Err(TaskManError::Database(format!("未知执行器类型: {other}")));
            }
        };

        let retry_strategy_str: String = row.try_get("retry_strategy").map_err(db_err)?;
        let retry_strategy = match retry_strategy_str.as_str() {
            "EXPONENTIAL" => RetryStrategy::Exponential,
            _ => RetryStrategy::Fixed,
        };

        let description: Option<String> = row.try_get("description").map_err(db_err)?;
        let executor_config: Option<Json<JsonMap>> =
            row.try_get("executor_config").map_err(db_err)?;

        Ok(TaskConfig {
            id: row.try_get("id").map_err(db_err)?,
            task_type: row.try_get("task_type").map_err(db_err)?,
            task_name: row.try_get("task_name").map_err(db_err)?,
            description: description.unwrap_or_default(),
            executor_type,
            executor_config: executor_config.map(|c| c.0).unwrap_or_default(),
            default_timeout: row.try_get("default_timeout").map_err(db_err)?,
            default_max_retry: row.try_get("default_max_retry").map_err(db_err)?,
            retry_strategy,
            retry_delay: row.try_get("retry_delay").map_err(db_err)?,
            backoff_rate: row.try_get("backoff_rate").map_err(db_err)?,
            max_concurrent: row.try_get("max_concurrent").map_err(db_err)?,
            enabled: row.try_get("enabled").map_err(db_err)?,
            created_at: row.try_get("created_at").map_err(db_err)?,
            updated_at: row.try_get("updated_at").map_err(db_err)?,
        })
    }
}

#[async_trait]
impl TaskConfigRepository for MySqlTaskConfigRepository {
    async fn create(&self, config: &TaskConfig) -> Result<()> {
        let query = "INSERT INTO task_config (task_type, task_name, description, executor_type, \
             executor_config, default_timeout, default_max_retry, retry_strategy, retry_delay, \
             backoff_rate, max_concurrent, enabled, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

        let result = sqlx::query(query)
            .bind(&config.task_type)
            .bind(&config.task_name)
            .bind(&config.description)
            .bind(config.executor_type.as_str())
            .bind(Json(&config.executor_config))
            .bind(config.default_timeout)
            .bind(config.default_max_retry)
            .bind(match config.retry_strategy {
                RetryStrategy::Fixed => "FIXED",
                RetryStrategy::Exponential => "EXPONENTIAL",
            })
            .bind(config.retry_delay)
            .bind(config.backoff_rate)
            .bind(config.max_concurrent)
            .bind(config.enabled)
            .bind(config.created_at)
            .bind(Utc::now())
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                TaskManError::conflict(format!("task config already exists: {}", config.task_type)),
            ),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn update(&self, config: &TaskConfig) -> Result<()> {
        let query = "UPDATE task_config SET task_name = ?, description = ?, executor_type = ?, \
             executor_config = ?, default_timeout = ?, default_max_retry = ?, retry_strategy = ?, \
             retry_delay = ?, backoff_rate = ?, max_concurrent = ?, enabled = ?, updated_at = ? \
             WHERE task_type = ?";

        let result = sqlx::query(query)
            .bind(&config.task_name)
            .bind(&config.description)
            .bind(config.executor_type.as_str())
            .bind(Json(&config.executor_config))
            .bind(config.default_timeout)
            .bind(config.default_max_retry)
            .bind(match config.retry_strategy {
                RetryStrategy::Fixed => "FIXED",
                RetryStrategy::Exponential => "EXPONENTIAL",
            })
            .bind(config.retry_delay)
            .bind(config.backoff_rate)
            .bind(config.max_concurrent)
            .bind(config.enabled)
            .bind(Utc::now())
            .bind(&config.task_type)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(TaskManError::TaskConfigNotFound {
                task_type: config.task_type.clone(),
            });
        }
        Ok(())
    }

    async fn delete(&self, task_type: &str) -> Result<()> {
        sqlx::query("DELETE FROM task_config WHERE task_type = ?")
            .bind(task_type)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn get_by_type(&self, task_type: &str) -> Result<TaskConfig> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM task_config WHERE task_type = ?");
        let row = sqlx::query(&query)
            .bind(task_type)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| TaskManError::TaskConfigNotFound {
                task_type: task_type.to_string(),
            })?;
        Self::row_to_config(&row)
    }

    async fn find_enabled(&self) -> Result<Vec<TaskConfig>> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM task_config WHERE enabled = TRUE");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(Self::row_to_config).collect()
    }

    async fn find_all(&self) -> Result<Vec<TaskConfig>> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM task_config");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(Self::row_to_config).collect()
    }
}
