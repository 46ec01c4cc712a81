use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use taskman_core::{Executor, ExecutorType, JsonMap, Result, Task, TaskManError};

type HandlerFn = Arc<dyn Fn(JsonMap) -> BoxFuture<'static, Result<JsonMap>> + Send + Sync>;

/// 本地执行器
///
/// 按任务类型分发到进程内注册的处理函数。处理函数在启动阶段
/// 注册完毕，运行期间只读。
pub struct LocalExecutor {
    handlers: HashMap<String, HandlerFn>,
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// 注册处理函数
    pub fn register_handler<F, Fut>(&mut self, task_type: &str, handler: F)
    where
        F: Fn(JsonMap) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<JsonMap>> + Send + 'static,
    {
        self.handlers.insert(
            task_type.to_string(),
            Arc::new(move |payload| Box::pin(handler(payload))),
        );
    }

    /// 带内置 echo 处理函数的执行器：原样返回载荷
    pub fn with_builtin_handlers() -> Self {
        let mut executor = Self::new();
        executor.register_handler("echo", |payload| async move { Ok(payload) });
        executor
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn execute(&self, task: &Task) -> Result<JsonMap> {
        let handler = self.handlers.get(&task.task_type).ok_or_else(|| {
            TaskManError::TaskExecution(format!(
                "handler not found for task type: {}",
                task.task_type
            ))
        })?;
        handler(task.payload.clone()).await
    }

    fn executor_type(&self) -> ExecutorType {
        ExecutorType::Local
    }

    fn supported_task_types(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }
}
