use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use taskman_core::{
    JsonMap, Result, Task, TaskConfigRepository, TaskLog, TaskLogRepository, TaskManError,
    TaskPriority, TaskRepository, TaskStatus,
};
use taskman_infrastructure::QueueManager;

/// 任务应用服务
///
/// 客户端可见的四个操作：创建、查询、取消、查日志。
/// 创建走任务类型目录校验，取消按任务当前状态分流：
/// 待处理任务直接落终态，处理中任务只设置取消标记，
/// 由属主 Worker 在下个轮询周期协作式取消。
pub struct TaskService {
    task_repo: Arc<dyn TaskRepository>,
    task_log_repo: Arc<dyn TaskLogRepository>,
    task_config_repo: Arc<dyn TaskConfigRepository>,
    queue_manager: Arc<QueueManager>,
}

impl TaskService {
    pub fn new(
        task_repo: Arc<dyn TaskRepository>,
        task_log_repo: Arc<dyn TaskLogRepository>,
        task_config_repo: Arc<dyn TaskConfigRepository>,
        queue_manager: Arc<QueueManager>,
    ) -> Self {
        Self {
            task_repo,
            task_log_repo,
            task_config_repo,
            queue_manager,
        }
    }

    /// 创建任务：校验类型配置、持久化、记录日志、推入全局队列
    pub async fn create_task(
        &self,
        task_type: &str,
        priority: TaskPriority,
        payload: JsonMap,
    ) -> Result<Task> {
        let config = self.task_config_repo.get_by_type(task_type).await?;

        if !config.is_enabled() {
            return Err(TaskManError::conflict(format!(
                "task type {task_type} is disabled"
            )));
        }

        let task_id = Uuid::new_v4().to_string();
        let task = config.instantiate(&task_id, priority, payload);

        self.task_repo.create(&task).await?;

        let log = TaskLog::state_change(&task_id, None, TaskStatus::Pending, "", "Task created");
        if let Err(e) = self.task_log_repo.create(&log).await {
            warn!("记录任务日志失败: {e}");
        }

        self.queue_manager.push_task(&task_id, priority).await?;

        info!("任务 {task_id} 已创建，类型: {task_type}");
        Ok(task)
    }

    /// 查询任务
    pub async fn get_task(&self, task_id: &str) -> Result<Task> {
        self.task_repo.get_by_id(task_id).await
    }

    /// 取消任务。仅 PENDING / PROCESSING 状态可取消，
    /// 其余状态返回冲突错误。
    pub async fn cancel_task(&self, task_id: &str) -> Result<()> {
        let mut task = self.task_repo.get_by_id(task_id).await?;

        if task.status != TaskStatus::Pending && task.status != TaskStatus::Processing {
            return Err(TaskManError::conflict(format!(
                "task cannot be cancelled, current status: {}",
                task.status
            )));
        }

        let from_status = task.status;
        if task.status == TaskStatus::Pending {
            // 未分派的任务直接落终态，调度器出队时丢弃
            task.mark_cancelled();
            self.task_repo.update(&task).await?;
        } else {
            // 处理中的任务设置取消标记，属主 Worker 协作式取消
            self.queue_manager.set_cancel_mark(task_id).await?;
        }

        let log = TaskLog::state_change(
            task_id,
            Some(from_status),
            TaskStatus::Cancelled,
            "",
            "Task cancelled by user",
        );
        if let Err(e) = self.task_log_repo.create(&log).await {
            warn!("记录任务日志失败: {e}");
        }

        info!("任务 {task_id} 取消请求已受理");
        Ok(())
    }

    /// 按创建顺序返回任务日志
    pub async fn get_task_logs(&self, task_id: &str) -> Result<Vec<TaskLog>> {
        self.task_log_repo.get_by_task_id(task_id).await
    }
}
