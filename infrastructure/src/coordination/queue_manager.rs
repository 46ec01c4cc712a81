use std::sync::Arc;
use std::time::Duration;

use taskman_core::{CoordinationStore, Result, TaskPriority};

pub const QUEUE_HIGH: &str = "queue:high";
pub const QUEUE_NORMAL: &str = "queue:normal";

/// 取消标记的保留时长
const CANCEL_MARK_TTL: Duration = Duration::from_secs(3600);

/// 队列管理器
///
/// 两级队列：全局入口按优先级分为 `queue:high` 与 `queue:normal`，
/// 出口为每个 Worker 一条 `worker:{id}:queue`。全局队列只有 Leader
/// 弹出，Worker 队列只有 Leader 推入、属主 Worker 弹出。
pub struct QueueManager {
    store: Arc<dyn CoordinationStore>,
}

impl QueueManager {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self { store }
    }

    fn worker_queue_key(worker_id: &str) -> String {
        format!("worker:{worker_id}:queue")
    }

    fn cancel_mark_key(task_id: &str) -> String {
        format!("task:cancel:{task_id}")
    }

    /// 按优先级推入全局队列，同一优先级内先进先出
    pub async fn push_task(&self, task_id: &str, priority: TaskPriority) -> Result<()> {
        let queue = if priority.is_high() { QUEUE_HIGH } else { QUEUE_NORMAL };
        self.store.push_left(queue, task_id).await
    }

    /// 从全局队列弹出一个任务：高优先级队列非空时严格优先。
    /// 两个队列都为空返回 `None`，调用方视为暂无工作。
    pub async fn pop_task(&self) -> Result<Option<String>> {
        if let Some(task_id) = self.store.pop_right(QUEUE_HIGH).await? {
            return Ok(Some(task_id));
        }
        self.store.pop_right(QUEUE_NORMAL).await
    }

    pub async fn queue_len(&self, queue: &str) -> Result<i64> {
        self.store.list_len(queue).await
    }

    /// 推入指定 Worker 的出口队列
    pub async fn push_to_worker_queue(&self, worker_id: &str, task_id: &str) -> Result<()> {
        self.store
            .push_left(&Self::worker_queue_key(worker_id), task_id)
            .await
    }

    /// 从自己的出口队列弹出任务
    pub async fn pop_from_worker_queue(&self, worker_id: &str) -> Result<Option<String>> {
        self.store.pop_right(&Self::worker_queue_key(worker_id)).await
    }

    /// 设置取消标记，通知已分派任务的 Worker 协作式取消
    pub async fn set_cancel_mark(&self, task_id: &str) -> Result<()> {
        self.store
            .set(&Self::cancel_mark_key(task_id), "1", Some(CANCEL_MARK_TTL))
            .await
    }

    pub async fn check_cancel_mark(&self, task_id: &str) -> Result<bool> {
        self.store.exists(&Self::cancel_mark_key(task_id)).await
    }

    pub async fn remove_cancel_mark(&self, task_id: &str) -> Result<()> {
        self.store.delete(&Self::cancel_mark_key(task_id)).await
    }
}
