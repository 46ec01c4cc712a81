use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use taskman_core::{Result, Task, TaskManError, TaskRepository, TaskStatus};

/// 内存任务仓储
///
/// 嵌入式运行模式与测试使用。终态单调性在这里仲裁：已处于
/// 终态的任务拒绝任何再更新。
#[derive(Default)]
pub struct MemoryTaskRepository {
    tasks: RwLock<HashMap<String, Task>>,
    next_id: RwLock<i64>,
}

impl MemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for MemoryTaskRepository {
    async fn create(&self, task: &Task) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.task_id) {
            return Err(TaskManError::conflict(format!(
                "task already exists: {}",
                task.task_id
            )));
        }
        let mut stored = task.clone();
        let mut next_id = self.next_id.write().await;
        *next_id += 1;
        stored.id = *next_id;
        tasks.insert(stored.task_id.clone(), stored);
        Ok(())
    }

    async fn get_by_id(&self, task_id: &str) -> Result<Task> {
        let tasks = self.tasks.read().await;
        tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| TaskManError::task_not_found(task_id))
    }

    async fn update(&self, task: &Task) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        let existing = tasks
            .get(&task.task_id)
            .ok_or_else(|| TaskManError::task_not_found(&task.task_id))?;

        // 终态任务拒绝再迁移，超时扫描与 Worker 上报的竞争在此仲裁
        if existing.is_final_state() {
            return Err(TaskManError::InvalidStateTransition {
                task_id: task.task_id.clone(),
            });
        }

        let mut updated = task.clone();
        updated.id = existing.id;
        updated.updated_at = Utc::now();
        tasks.insert(updated.task_id.clone(), updated);
        Ok(())
    }

    async fn delete(&self, task_id: &str) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        tasks.remove(task_id);
        Ok(())
    }

    async fn find_pending_tasks(&self, limit: i64) -> Result<Vec<Task>> {
        let tasks = self.tasks.read().await;
        let now = Utc::now();
        Ok(tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending && t.scheduled_at <= now)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn find_processing_tasks(&self) -> Result<Vec<Task>> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .values()
            .filter(|t| t.status == TaskStatus::Processing)
            .cloned()
            .collect())
    }

    async fn find_timeout_tasks(&self) -> Result<Vec<Task>> {
        let tasks = self.tasks.read().await;
        Ok(tasks.values().filter(|t| t.is_timeout()).cloned().collect())
    }

    async fn find_by_status(&self, status: TaskStatus, limit: i64) -> Result<Vec<Task>> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .values()
            .filter(|t| t.status == status)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskman_core::{JsonMap, TaskPriority};

    fn new_task(task_id: &str) -> Task {
        let now = Utc::now();
        Task {
            id: 0,
            task_id: task_id.to_string(),
            task_type: "echo".to_string(),
            priority: TaskPriority::Normal,
            status: TaskStatus::Pending,
            payload: JsonMap::new(),
            result: JsonMap::new(),
            error_msg: String::new(),
            retry_count: 0,
            max_retry: 3,
            timeout_seconds: 60,
            worker_id: String::new(),
            scheduled_at: now,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = MemoryTaskRepository::new();
        let task = new_task("t1");
        repo.create(&task).await.unwrap();

        let loaded = repo.get_by_id("t1").await.unwrap();
        assert_eq!(loaded.task_id, "t1");
        assert!(loaded.id > 0);
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let repo = MemoryTaskRepository::new();
        repo.create(&new_task("t1")).await.unwrap();

        let err = repo.create(&new_task("t1")).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_get_missing_returns_not_found() {
        let repo = MemoryTaskRepository::new();
        let err = repo.get_by_id("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_terminal_update_rejected() {
        let repo = MemoryTaskRepository::new();
        let mut task = new_task("t1");
        repo.create(&task).await.unwrap();

        task.mark_processing("w1");
        repo.update(&task).await.unwrap();
        task.mark_success(JsonMap::new());
        repo.update(&task).await.unwrap();

        // 任务已成功，超时扫描迟到的 TIMEOUT 更新必须被拒绝
        let mut racing = repo.get_by_id("t1").await.unwrap();
        racing.mark_timeout();
        let err = repo.update(&racing).await.unwrap_err();
        assert!(err.is_conflict());

        let persisted = repo.get_by_id("t1").await.unwrap();
        assert_eq!(persisted.status, TaskStatus::Success);
    }

    #[tokio::test]
    async fn test_failed_with_retries_left_can_still_update() {
        let repo = MemoryTaskRepository::new();
        let mut task = new_task("t1");
        repo.create(&task).await.unwrap();

        task.mark_processing("w1");
        repo.update(&task).await.unwrap();
        task.mark_failed("boom");
        repo.update(&task).await.unwrap();

        // FAILED 且还有重试次数不是终态，允许重试复位
        task.mark_retrying();
        repo.update(&task).await.unwrap();
        assert_eq!(
            repo.get_by_id("t1").await.unwrap().status,
            TaskStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_find_timeout_tasks() {
        let repo = MemoryTaskRepository::new();
        let mut task = new_task("t1");
        task.status = TaskStatus::Processing;
        task.worker_id = "w1".to_string();
        task.timeout_seconds = 1;
        task.started_at = Some(Utc::now() - chrono::Duration::seconds(10));
        repo.create(&task).await.unwrap();

        let timed_out = repo.find_timeout_tasks().await.unwrap();
        assert_eq!(timed_out.len(), 1);
        assert_eq!(timed_out[0].task_id, "t1");
    }

    #[tokio::test]
    async fn test_sequential_retry_resets_accumulate() {
        let repo = MemoryTaskRepository::new();
        let mut task = new_task("t1");
        repo.create(&task).await.unwrap();

        // 两轮 失败→复位，重试计数恰好累加到 2
        for expected in 1..=2 {
            task.mark_processing("w1");
            repo.update(&task).await.unwrap();
            task.mark_failed("boom");
            repo.update(&task).await.unwrap();
            task.mark_retrying();
            repo.update(&task).await.unwrap();

            let persisted = repo.get_by_id("t1").await.unwrap();
            assert_eq!(persisted.status, TaskStatus::Pending);
            assert_eq!(persisted.retry_count, expected);
        }
    }

    #[tokio::test]
    async fn test_find_by_status() {
        let repo = MemoryTaskRepository::new();
        repo.create(&new_task("t1")).await.unwrap();
        repo.create(&new_task("t2")).await.unwrap();

        let pending = repo.find_by_status(TaskStatus::Pending, 10).await.unwrap();
        assert_eq!(pending.len(), 2);
        let limited = repo.find_by_status(TaskStatus::Pending, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }
}
