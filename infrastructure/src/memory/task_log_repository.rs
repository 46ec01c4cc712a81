use async_trait::async_trait;
use tokio::sync::RwLock;

use taskman_core::{Result, TaskLog, TaskLogRepository};

/// 内存任务日志仓储（只追加）
#[derive(Default)]
pub struct MemoryTaskLogRepository {
    logs: RwLock<Vec<TaskLog>>,
}

impl MemoryTaskLogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskLogRepository for MemoryTaskLogRepository {
    async fn create(&self, log: &TaskLog) -> Result<()> {
        let mut logs = self.logs.write().await;
        let mut stored = log.clone();
        stored.id = logs.len() as i64 + 1;
        logs.push(stored);
        Ok(())
    }

    async fn get_by_task_id(&self, task_id: &str) -> Result<Vec<TaskLog>> {
        let logs = self.logs.read().await;
        Ok(logs.iter().filter(|l| l.task_id == task_id).cloned().collect())
    }
}
