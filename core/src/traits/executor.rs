use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::Result;
use crate::models::{ExecutorType, JsonMap, Task};

/// 任务执行器接口
///
/// 执行在调用方施加的截止期内进行：Worker 以 `task.timeout_seconds`
/// 包裹 `execute` 调用，超期时该 future 被放弃，执行器不应依赖
/// 执行一定会运行到返回。
#[async_trait]
pub trait Executor: Send + Sync {
    /// 执行任务并返回结果映射
    async fn execute(&self, task: &Task) -> Result<JsonMap>;

    /// 执行器类型
    fn executor_type(&self) -> ExecutorType;

    /// 支持的任务类型列表
    fn supported_task_types(&self) -> Vec<String>;
}

/// 执行器注册表
///
/// 注册表强持有执行器实例；重复注册同一任务类型会被拒绝，
/// 不允许静默覆盖。
pub trait ExecutorRegistry: Send + Sync {
    /// 注册执行器，任一支持类型已被占用时返回冲突错误
    fn register(&self, executor: Arc<dyn Executor>) -> Result<()>;

    /// 按任务类型查找执行器
    fn get(&self, task_type: &str) -> Result<Arc<dyn Executor>>;

    /// 列出所有已注册的任务类型
    fn list_task_types(&self) -> Vec<String>;
}
