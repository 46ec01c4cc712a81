use async_trait::async_trait;
use chrono::Duration;

use crate::errors::Result;
use crate::models::{Task, TaskConfig, TaskLog, TaskStatus, Worker};

/// 任务仓储接口
///
/// 任务的权威状态由仓储持有。实现方必须拒绝会使终态任务再次
/// 发生迁移的更新（返回 `InvalidStateTransition`），调度器的超时
/// 扫描与 Worker 的完成上报之间的竞争由这条规则仲裁。
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// 创建任务，`task_id` 重复时返回冲突错误
    async fn create(&self, task: &Task) -> Result<()>;

    /// 根据任务ID查找任务
    async fn get_by_id(&self, task_id: &str) -> Result<Task>;

    /// 更新任务，终态任务的再迁移会被拒绝
    async fn update(&self, task: &Task) -> Result<()>;

    /// 删除任务
    async fn delete(&self, task_id: &str) -> Result<()>;

    /// 查找待执行的任务
    async fn find_pending_tasks(&self, limit: i64) -> Result<Vec<Task>>;

    /// 查找正在执行的任务
    async fn find_processing_tasks(&self) -> Result<Vec<Task>>;

    /// 查找执行已超过声明时限的任务
    async fn find_timeout_tasks(&self) -> Result<Vec<Task>>;

    /// 根据状态查找任务
    async fn find_by_status(&self, status: TaskStatus, limit: i64) -> Result<Vec<Task>>;
}

/// 任务日志仓储接口（只追加）
#[async_trait]
pub trait TaskLogRepository: Send + Sync {
    async fn create(&self, log: &TaskLog) -> Result<()>;

    /// 按创建顺序返回任务的全部日志
    async fn get_by_task_id(&self, task_id: &str) -> Result<Vec<TaskLog>>;
}

/// 任务配置仓储接口
#[async_trait]
pub trait TaskConfigRepository: Send + Sync {
    async fn create(&self, config: &TaskConfig) -> Result<()>;

    async fn update(&self, config: &TaskConfig) -> Result<()>;

    async fn delete(&self, task_type: &str) -> Result<()>;

    async fn get_by_type(&self, task_type: &str) -> Result<TaskConfig>;

    async fn find_enabled(&self) -> Result<Vec<TaskConfig>>;

    async fn find_all(&self) -> Result<Vec<TaskConfig>>;
}

/// Worker 注册表接口
///
/// Worker 记录是短生存期状态：注册时写入并设置 TTL，心跳续期，
/// TTL 过期后记录自动消失。任务类型到 Worker 的索引在注册/注销时
/// 维护，允许短暂的陈旧条目，健康过滤在下游完成。
#[async_trait]
pub trait WorkerRegistry: Send + Sync {
    /// 注册（或覆盖）Worker 记录并维护任务类型索引
    async fn register(&self, worker: &Worker) -> Result<()>;

    /// 注销 Worker 并清理索引
    async fn remove(&self, worker_id: &str) -> Result<()>;

    async fn get_by_id(&self, worker_id: &str) -> Result<Worker>;

    /// 覆盖更新 Worker 记录
    async fn update(&self, worker: &Worker) -> Result<()>;

    /// 刷新心跳时间并续期记录 TTL
    async fn update_heartbeat(&self, worker_id: &str) -> Result<()>;

    /// 原子替换负载计数
    async fn update_load(&self, worker_id: &str, load: i32) -> Result<()>;

    async fn find_all(&self) -> Result<Vec<Worker>>;

    /// 返回心跳仍然新鲜的 Worker
    async fn find_healthy(&self, heartbeat_timeout: Duration) -> Result<Vec<Worker>>;

    /// 通过类型索引查找支持指定任务类型的 Worker
    async fn find_by_task_type(&self, task_type: &str) -> Result<Vec<Worker>>;
}
