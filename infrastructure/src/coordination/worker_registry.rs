use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::warn;

use taskman_core::{CoordinationStore, Result, TaskManError, Worker, WorkerRegistry};

const WORKER_KEY_PREFIX: &str = "worker:";

/// Worker 记录的存活时长，心跳续期
const WORKER_TTL: std::time::Duration = std::time::Duration::from_secs(30);

/// 协调存储上的 Worker 注册表
///
/// 每个 Worker 以一份 JSON 文档存放在 `worker:{id}` 键下并带 TTL；
/// 任务类型索引是 `worker:type:{task_type}` 集合。索引写入少读取多，
/// 允许短暂陈旧：失效的成员在查询时会因记录缺失被跳过，健康过滤
/// 由调用方在下游完成。
pub struct StoreWorkerRegistry {
    store: Arc<dyn CoordinationStore>,
}

impl StoreWorkerRegistry {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self { store }
    }

    fn worker_key(worker_id: &str) -> String {
        format!("{WORKER_KEY_PREFIX}{worker_id}")
    }

    fn type_index_key(task_type: &str) -> String {
        format!("worker:type:{task_type}")
    }

    async fn save(&self, worker: &Worker) -> Result<()> {
        let payload = serde_json::to_string(worker)?;
        self.store
            .set(&Self::worker_key(&worker.worker_id), &payload, Some(WORKER_TTL))
            .await
    }
}

#[async_trait]
impl WorkerRegistry for StoreWorkerRegistry {
    async fn register(&self, worker: &Worker) -> Result<()> {
        self.save(worker).await?;
        for task_type in &worker.supported_types {
            self.store
                .set_add(&Self::type_index_key(task_type), &worker.worker_id)
                .await?;
        }
        Ok(())
    }

    async fn remove(&self, worker_id: &str) -> Result<()> {
        // 先取记录以清理索引，记录已消失时索引条目留给查询端过滤
        if let Ok(worker) = self.get_by_id(worker_id).await {
            for task_type in &worker.supported_types {
                let _ = self
                    .store
                    .set_remove(&Self::type_index_key(task_type), worker_id)
                    .await;
            }
        }
        self.store.delete(&Self::worker_key(worker_id)).await
    }

    async fn get_by_id(&self, worker_id: &str) -> Result<Worker> {
        let payload = self
            .store
            .get(&Self::worker_key(worker_id))
            .await?
            .ok_or_else(|| TaskManError::worker_not_found(worker_id))?;
        Ok(serde_json::from_str(&payload)?)
    }

    async fn update(&self, worker: &Worker) -> Result<()> {
        self.register(worker).await
    }

    async fn update_heartbeat(&self, worker_id: &str) -> Result<()> {
        let mut worker = self.get_by_id(worker_id).await?;
        worker.touch_heartbeat();
        worker.updated_at = Utc::now();
        self.save(&worker).await
    }

    async fn update_load(&self, worker_id: &str, load: i32) -> Result<()> {
        let mut worker = self.get_by_id(worker_id).await?;
        worker.current_load = load.max(0);
        worker.updated_at = Utc::now();
        self.save(&worker).await
    }

    async fn find_all(&self) -> Result<Vec<Worker>> {
        let keys = self.store.scan_keys(WORKER_KEY_PREFIX).await?;
        let mut workers = Vec::with_capacity(keys.len());
        for key in keys {
            // 跳过同前缀下的索引键和队列键
            if key.contains(":type:") || key.ends_with(":queue") {
                continue;
            }
            let Some(payload) = self.store.get(&key).await? else {
                continue;
            };
            match serde_json::from_str::<Worker>(&payload) {
                Ok(worker) => workers.push(worker),
                Err(e) => warn!("解析Worker记录失败: {key}: {e}"),
            }
        }
        Ok(workers)
    }

    async fn find_healthy(&self, heartbeat_timeout: Duration) -> Result<Vec<Worker>> {
        let workers = self.find_all().await?;
        Ok(workers
            .into_iter()
            .filter(|w| w.is_healthy(heartbeat_timeout))
            .collect())
    }

    async fn find_by_task_type(&self, task_type: &str) -> Result<Vec<Worker>> {
        let worker_ids = self
            .store
            .set_members(&Self::type_index_key(task_type))
            .await?;
        let mut workers = Vec::with_capacity(worker_ids.len());
        for worker_id in worker_ids {
            match self.get_by_id(&worker_id).await {
                Ok(worker) => workers.push(worker),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(workers)
    }
}
