mod task_config_repository;
mod task_log_repository;
mod task_repository;

pub use task_config_repository::MySqlTaskConfigRepository;
pub use task_log_repository::MySqlTaskLogRepository;
pub use task_repository::MySqlTaskRepository;

use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use std::time::Duration;

use taskman_core::config::DatabaseConfig;
use taskman_core::{Result, TaskManError};

/// 创建 MySQL 连接池
pub async fn connect_pool(config: &DatabaseConfig) -> Result<MySqlPool> {
    MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .connect(&config.url)
        .await
        .map_err(|e| TaskManError::Database(format!("连接数据库失败: {e}")))
}

pub(crate) fn db_err(e: sqlx::Error) -> TaskManError {
    TaskManError::Database(e.to_string())
}
