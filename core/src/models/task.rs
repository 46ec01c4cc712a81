use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 任务载荷与结果使用的不透明键值映射
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Cancelled,
    Timeout,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Processing => "PROCESSING",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Cancelled => "CANCELLED",
            TaskStatus::Timeout => "TIMEOUT",
        }
    }

    pub fn parse(s: &str) -> Option<TaskStatus> {
        match s {
            "PENDING" => Some(TaskStatus::Pending),
            "PROCESSING" => Some(TaskStatus::Processing),
            "SUCCESS" => Some(TaskStatus::Success),
            "FAILED" => Some(TaskStatus::Failed),
            "CANCELLED" => Some(TaskStatus::Cancelled),
            "TIMEOUT" => Some(TaskStatus::Timeout),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 任务优先级（值对象）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    #[default]
    Normal,
    High,
}

impl TaskPriority {
    pub fn is_high(&self) -> bool {
        matches!(self, TaskPriority::High)
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, TaskPriority::Normal)
    }

    pub fn value(&self) -> i32 {
        match self {
            TaskPriority::Normal => 0,
            TaskPriority::High => 1,
        }
    }

    pub fn from_value(v: i32) -> TaskPriority {
        if v == 1 {
            TaskPriority::High
        } else {
            TaskPriority::Normal
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::High => f.write_str("HIGH"),
            TaskPriority::Normal => f.write_str("NORMAL"),
        }
    }
}

/// 任务实体（聚合根）
///
/// 任务的权威状态由持久化仓储持有，内存中的 `Task` 值只是瞬时视图。
/// 状态迁移只能通过下面的 `mark_*` 方法进行。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: i64,
    pub task_id: String,
    pub task_type: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub payload: JsonMap,
    pub result: JsonMap,
    pub error_msg: String,
    pub retry_count: i32,
    pub max_retry: i32,
    pub timeout_seconds: i64,
    pub worker_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// 判断任务是否可以重试
    pub fn can_retry(&self) -> bool {
        matches!(self.status, TaskStatus::Failed | TaskStatus::Timeout)
            && self.retry_count < self.max_retry
    }

    /// 标记任务为处理中
    pub fn mark_processing(&mut self, worker_id: &str) {
        self.status = TaskStatus::Processing;
        self.worker_id = worker_id.to_string();
        self.started_at = Some(Utc::now());
    }

    /// 标记任务为成功
    pub fn mark_success(&mut self, result: JsonMap) {
        self.status = TaskStatus::Success;
        self.result = result;
        self.completed_at = Some(Utc::now());
    }

    /// 标记任务为失败
    pub fn mark_failed(&mut self, error_msg: &str) {
        self.status = TaskStatus::Failed;
        self.error_msg = error_msg.to_string();
        self.completed_at = Some(Utc::now());
    }

    /// 标记任务为超时
    pub fn mark_timeout(&mut self) {
        self.status = TaskStatus::Timeout;
        self.error_msg = "Task execution timeout".to_string();
        self.completed_at = Some(Utc::now());
    }

    /// 标记任务为已取消
    pub fn mark_cancelled(&mut self) {
        self.status = TaskStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }

    /// 重试复位：回到待处理状态并清除本轮执行痕迹
    pub fn mark_retrying(&mut self) {
        self.status = TaskStatus::Pending;
        self.retry_count += 1;
        self.worker_id.clear();
        self.started_at = None;
        self.completed_at = None;
    }

    /// 判断处理中的任务是否已超过声明的执行时限
    pub fn is_timeout(&self) -> bool {
        if self.status != TaskStatus::Processing {
            return false;
        }
        match self.started_at {
            Some(started) => {
                (Utc::now() - started).num_seconds() > self.timeout_seconds
            }
            None => false,
        }
    }

    /// 判断是否是终态：SUCCESS、CANCELLED，或重试次数已耗尽的 FAILED/TIMEOUT
    pub fn is_final_state(&self) -> bool {
        match self.status {
            TaskStatus::Success | TaskStatus::Cancelled => true,
            TaskStatus::Failed | TaskStatus::Timeout => !self.can_retry(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_task(status: TaskStatus, retry_count: i32, max_retry: i32) -> Task {
        let now = Utc::now();
        Task {
            id: 0,
            task_id: "test-task".to_string(),
            task_type: "echo".to_string(),
            priority: TaskPriority::Normal,
            status,
            payload: JsonMap::new(),
            result: JsonMap::new(),
            error_msg: String::new(),
            retry_count,
            max_retry,
            timeout_seconds: 300,
            worker_id: String::new(),
            scheduled_at: now,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_priority_predicates() {
        assert!(TaskPriority::High.is_high());
        assert!(!TaskPriority::High.is_normal());
        assert!(TaskPriority::Normal.is_normal());
        assert_eq!(TaskPriority::High.value(), 1);
        assert_eq!(TaskPriority::Normal.value(), 0);
        assert_eq!(TaskPriority::High.to_string(), "HIGH");
        assert_eq!(TaskPriority::Normal.to_string(), "NORMAL");
        assert_eq!(TaskPriority::from_value(1), TaskPriority::High);
        assert_eq!(TaskPriority::from_value(0), TaskPriority::Normal);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Processing,
            TaskStatus::Success,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
            TaskStatus::Timeout,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("RUNNING"), None);
    }

    #[test]
    fn test_can_retry() {
        assert!(base_task(TaskStatus::Failed, 2, 3).can_retry());
        assert!(base_task(TaskStatus::Timeout, 1, 3).can_retry());
        assert!(!base_task(TaskStatus::Failed, 3, 3).can_retry());
        assert!(!base_task(TaskStatus::Success, 0, 3).can_retry());
        assert!(!base_task(TaskStatus::Pending, 0, 3).can_retry());
        // max_retry = 0 的任务永远不会回退到 PENDING
        assert!(!base_task(TaskStatus::Failed, 0, 0).can_retry());
    }

    #[test]
    fn test_mark_processing() {
        let mut task = base_task(TaskStatus::Pending, 0, 3);
        task.mark_processing("worker-001");

        assert_eq!(task.status, TaskStatus::Processing);
        assert_eq!(task.worker_id, "worker-001");
        assert!(task.started_at.is_some());
    }

    #[test]
    fn test_mark_success() {
        let mut task = base_task(TaskStatus::Processing, 0, 3);
        let mut result = JsonMap::new();
        result.insert("message".to_string(), serde_json::json!("success"));
        task.mark_success(result);

        assert_eq!(task.status, TaskStatus::Success);
        assert!(!task.result.is_empty());
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn test_mark_failed() {
        let mut task = base_task(TaskStatus::Processing, 0, 3);
        task.mark_failed("execution failed");

        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error_msg, "execution failed");
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn test_mark_timeout() {
        let mut task = base_task(TaskStatus::Processing, 0, 3);
        task.mark_timeout();

        assert_eq!(task.status, TaskStatus::Timeout);
        assert_eq!(task.error_msg, "Task execution timeout");
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn test_mark_cancelled() {
        let mut task = base_task(TaskStatus::Processing, 0, 3);
        task.mark_cancelled();

        assert_eq!(task.status, TaskStatus::Cancelled);
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn test_mark_retrying() {
        let mut task = base_task(TaskStatus::Failed, 1, 3);
        task.worker_id = "worker-001".to_string();
        task.started_at = Some(Utc::now());
        task.completed_at = Some(Utc::now());

        task.mark_retrying();

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 2);
        assert!(task.worker_id.is_empty());
        assert!(task.started_at.is_none());
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn test_is_timeout() {
        let mut task = base_task(TaskStatus::Processing, 0, 3);
        task.timeout_seconds = 300;
        task.started_at = Some(Utc::now() - chrono::Duration::minutes(10));
        assert!(task.is_timeout());

        task.started_at = Some(Utc::now() - chrono::Duration::minutes(2));
        assert!(!task.is_timeout());

        task.status = TaskStatus::Pending;
        task.started_at = Some(Utc::now() - chrono::Duration::minutes(10));
        assert!(!task.is_timeout());

        task.status = TaskStatus::Processing;
        task.started_at = None;
        assert!(!task.is_timeout());
    }

    #[test]
    fn test_is_final_state() {
        assert!(base_task(TaskStatus::Success, 0, 3).is_final_state());
        assert!(base_task(TaskStatus::Cancelled, 0, 3).is_final_state());
        assert!(base_task(TaskStatus::Failed, 3, 3).is_final_state());
        assert!(!base_task(TaskStatus::Failed, 1, 3).is_final_state());
        assert!(base_task(TaskStatus::Timeout, 3, 3).is_final_state());
        assert!(!base_task(TaskStatus::Pending, 0, 3).is_final_state());
        assert!(!base_task(TaskStatus::Processing, 0, 3).is_final_state());
    }

    #[test]
    fn test_retry_count_never_exceeds_max() {
        let mut task = base_task(TaskStatus::Failed, 0, 2);
        while task.can_retry() {
            task.mark_retrying();
            task.mark_failed("again");
        }
        assert_eq!(task.retry_count, 2);
        assert!(task.is_final_state());
    }
}
