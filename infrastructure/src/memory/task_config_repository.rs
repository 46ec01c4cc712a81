use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use taskman_core::{Result, TaskConfig, TaskConfigRepository, TaskManError};

/// 内存任务配置仓储
#[derive(Default)]
pub struct MemoryTaskConfigRepository {
    configs: RwLock<HashMap<String, TaskConfig>>,
}

impl MemoryTaskConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskConfigRepository for MemoryTaskConfigRepository {
    async fn create(&self, config: &TaskConfig) -> Result<()> {
        let mut configs = self.configs.write().await;
        if configs.contains_key(&config.task_type) {
            return Err(TaskManError::conflict(format!(
                "task config already exists: {}",
                config.task_type
            )));
        }
        configs.insert(config.task_type.clone(), config.clone());
        Ok(())
    }

    async fn update(&self, config: &TaskConfig) -> Result<()> {
        let mut configs = self.configs.write().await;
        if !configs.contains_key(&config.task_type) {
            return Err(TaskManError::TaskConfigNotFound {
                task_type: config.task_type.clone(),
            });
        }
        configs.insert(config.task_type.clone(), config.clone());
        Ok(())
    }

    async fn delete(&self, task_type: &str) -> Result<()> {
        let mut configs = self.configs.write().await;
        configs.remove(task_type);
        Ok(())
    }

    async fn get_by_type(&self, task_type: &str) -> Result<TaskConfig> {
        let configs = self.configs.read().await;
        configs
            .get(task_type)
            .cloned()
            .ok_or_else(|| TaskManError::TaskConfigNotFound {
                task_type: task_type.to_string(),
            })
    }

    async fn find_enabled(&self) -> Result<Vec<TaskConfig>> {
        let configs = self.configs.read().await;
        Ok(configs.values().filter(|c| c.enabled).cloned().collect())
    }

    async fn find_all(&self) -> Result<Vec<TaskConfig>> {
        let configs = self.configs.read().await;
        Ok(configs.values().cloned().collect())
    }
}
