use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::TaskStatus;

/// 日志类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogType {
    StateChange,
    Retry,
    Error,
    Info,
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::StateChange => "STATE_CHANGE",
            LogType::Retry => "RETRY",
            LogType::Error => "ERROR",
            LogType::Info => "INFO",
        }
    }
}

/// 任务日志（只追加，创建后不可变更）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskLog {
    pub id: i64,
    pub task_id: String,
    pub log_type: LogType,
    pub from_status: Option<TaskStatus>,
    pub to_status: Option<TaskStatus>,
    pub message: String,
    pub worker_id: String,
    pub retry_count: i32,
    pub error_detail: String,
    pub created_at: DateTime<Utc>,
}

impl TaskLog {
    /// 创建状态变更日志
    pub fn state_change(
        task_id: &str,
        from_status: Option<TaskStatus>,
        to_status: TaskStatus,
        worker_id: &str,
        message: &str,
    ) -> Self {
        Self {
            id: 0,
            task_id: task_id.to_string(),
            log_type: LogType::StateChange,
            from_status,
            to_status: Some(to_status),
            message: message.to_string(),
            worker_id: worker_id.to_string(),
            retry_count: 0,
            error_detail: String::new(),
            created_at: Utc::now(),
        }
    }

    /// 创建重试日志
    pub fn retry(task_id: &str, retry_count: i32, message: &str) -> Self {
        Self {
            id: 0,
            task_id: task_id.to_string(),
            log_type: LogType::Retry,
            from_status: None,
            to_status: None,
            message: message.to_string(),
            worker_id: String::new(),
            retry_count,
            error_detail: String::new(),
            created_at: Utc::now(),
        }
    }

    /// 创建错误日志
    pub fn error(task_id: &str, worker_id: &str, message: &str, error_detail: &str) -> Self {
        Self {
            id: 0,
            task_id: task_id.to_string(),
            log_type: LogType::Error,
            from_status: None,
            to_status: None,
            message: message.to_string(),
            worker_id: worker_id.to_string(),
            retry_count: 0,
            error_detail: error_detail.to_string(),
            created_at: Utc::now(),
        }
    }

    /// 创建信息日志
    pub fn info(task_id: &str, message: &str) -> Self {
        Self {
            id: 0,
            task_id: task_id.to_string(),
            log_type: LogType::Info,
            from_status: None,
            to_status: None,
            message: message.to_string(),
            worker_id: String::new(),
            retry_count: 0,
            error_detail: String::new(),
            created_at: Utc::now(),
        }
    }
}
