use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use taskman_core::{Executor, ExecutorRegistry, Result, TaskManError};

/// 进程内执行器注册表
///
/// 写入仅发生在启动阶段，读取在每次任务处理时并发进行。
pub struct LocalExecutorRegistry {
    executors: RwLock<HashMap<String, Arc<dyn Executor>>>,
}

impl LocalExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for LocalExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorRegistry for LocalExecutorRegistry {
    fn register(&self, executor: Arc<dyn Executor>) -> Result<()> {
        let mut executors = self
            .executors
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let task_types = executor.supported_task_types();
        for task_type in &task_types {
            if executors.contains_key(task_type) {
                return Err(TaskManError::conflict(format!(
                    "executor for task type {task_type} already registered"
                )));
            }
        }
        for task_type in task_types {
            executors.insert(task_type, executor.clone());
        }
        Ok(())
    }

    fn get(&self, task_type: &str) -> Result<Arc<dyn Executor>> {
        let executors = self
            .executors
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        executors
            .get(task_type)
            .cloned()
            .ok_or_else(|| TaskManError::ExecutorNotFound {
                task_type: task_type.to_string(),
            })
    }

    fn list_task_types(&self) -> Vec<String> {
        let executors = self
            .executors
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        executors.keys().cloned().collect()
    }
}
