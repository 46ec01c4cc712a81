use thiserror::Error;

/// 系统统一错误类型
#[derive(Debug, Error)]
pub enum TaskManError {
    #[error("任务未找到: {task_id}")]
    TaskNotFound { task_id: String },
    #[error("任务配置未找到: {task_type}")]
    TaskConfigNotFound { task_type: String },
    #[error("Worker未找到: {worker_id}")]
    WorkerNotFound { worker_id: String },
    #[error("冲突: {0}")]
    Conflict(String),
    #[error("无效的状态转换: {task_id} 当前已处于终态")]
    InvalidStateTransition { task_id: String },
    #[error("协调存储不可用: {0}")]
    StoreUnavailable(String),
    #[error("数据库错误: {0}")]
    Database(String),
    #[error("没有可用的Worker")]
    NoAvailableWorker,
    #[error("未找到任务类型 {task_type} 的执行器")]
    ExecutorNotFound { task_type: String },
    #[error("任务执行超时")]
    DeadlineExceeded,
    #[error("失去领导权")]
    LeadershipLost,
    #[error("操作已取消")]
    Cancelled,
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("任务执行错误: {0}")]
    TaskExecution(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, TaskManError>;

impl TaskManError {
    pub fn task_not_found<S: Into<String>>(task_id: S) -> Self {
        Self::TaskNotFound {
            task_id: task_id.into(),
        }
    }

    pub fn worker_not_found<S: Into<String>>(worker_id: S) -> Self {
        Self::WorkerNotFound {
            worker_id: worker_id.into(),
        }
    }

    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn store_error<S: Into<String>>(msg: S) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// 是否为未找到类错误
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::TaskNotFound { .. }
                | Self::TaskConfigNotFound { .. }
                | Self::WorkerNotFound { .. }
                | Self::ExecutorNotFound { .. }
        )
    }

    /// 是否为冲突类错误（重复创建、非法状态转换等）
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::InvalidStateTransition { .. })
    }

    /// 是否为瞬时错误，调用方可以稍后重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::Database(_) | Self::DeadlineExceeded
        )
    }
}

impl From<serde_json::Error> for TaskManError {
    fn from(err: serde_json::Error) -> Self {
        TaskManError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for TaskManError {
    fn from(err: anyhow::Error) -> Self {
        TaskManError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(TaskManError::task_not_found("t1").is_not_found());
        assert!(TaskManError::conflict("dup").is_conflict());
        assert!(TaskManError::InvalidStateTransition {
            task_id: "t1".to_string()
        }
        .is_conflict());
        assert!(TaskManError::store_error("conn refused").is_retryable());
        assert!(!TaskManError::NoAvailableWorker.is_retryable());
        assert!(!TaskManError::LeadershipLost.is_not_found());
    }

    #[test]
    fn test_error_display() {
        let err = TaskManError::ExecutorNotFound {
            task_type: "echo".to_string(),
        };
        assert!(err.to_string().contains("echo"));
    }
}
