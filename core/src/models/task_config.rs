use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::task::{JsonMap, Task, TaskPriority, TaskStatus};

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetryStrategy {
    Fixed,
    Exponential,
}

/// 执行器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutorType {
    Local,
    Http,
}

impl ExecutorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutorType::Local => "LOCAL",
            ExecutorType::Http => "HTTP",
        }
    }
}

/// 任务类型配置（聚合根），按 `task_type` 唯一
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskConfig {
    pub id: i64,
    pub task_type: String,
    pub task_name: String,
    pub description: String,
    pub executor_type: ExecutorType,
    pub executor_config: JsonMap,
    pub default_timeout: i64,
    pub default_max_retry: i32,
    pub retry_strategy: RetryStrategy,
    pub retry_delay: i64,
    pub backoff_rate: f64,
    pub max_concurrent: i32,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 计算下次重试前的等待时长
    pub fn next_retry_delay(&self, retry_count: i32) -> Duration {
        let base = self.retry_delay.max(0) as f64;
        let secs = match self.retry_strategy {
            RetryStrategy::Exponential => base * self.backoff_rate.powi(retry_count),
            RetryStrategy::Fixed => base,
        };
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// 按配置的默认值实例化一个新任务
    pub fn instantiate(&self, task_id: &str, priority: TaskPriority, payload: JsonMap) -> Task {
        let now = Utc::now();
        Task {
            id: 0,
            task_id: task_id.to_string(),
            task_type: self.task_type.clone(),
            priority,
            status: TaskStatus::Pending,
            payload,
            result: JsonMap::new(),
            error_msg: String::new(),
            retry_count: 0,
            max_retry: self.default_max_retry,
            timeout_seconds: self.default_timeout,
            worker_id: String::new(),
            scheduled_at: now,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
