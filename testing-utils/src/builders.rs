use chrono::Utc;

use taskman_core::{
    ExecutorType, JsonMap, RetryStrategy, Task, TaskConfig, TaskPriority, TaskStatus, Worker,
};

/// Task 构建器
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(task_id: &str) -> Self {
        let now = Utc::now();
        Self {
            task: Task {
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
            },
        }
    }

    pub fn task_type(mut self, task_type: &str) -> Self {
        self.task.task_type = task_type.to_string();
        self
    }

    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        self
    }

    pub fn payload(mut self, payload: JsonMap) -> Self {
        self.task.payload = payload;
        self
    }

    pub fn payload_entry(mut self, key: &str, value: serde_json::Value) -> Self {
        self.task.payload.insert(key.to_string(), value);
        self
    }

    pub fn max_retry(mut self, max_retry: i32) -> Self {
        self.task.max_retry = max_retry;
        self
    }

    pub fn retry_count(mut self, retry_count: i32) -> Self {
        self.task.retry_count = retry_count;
        self
    }

    pub fn timeout_seconds(mut self, timeout_seconds: i64) -> Self {
        self.task.timeout_seconds = timeout_seconds;
        self
    }

    /// 置为处理中状态，started_at 回拨指定秒数
    pub fn processing_since(mut self, worker_id: &str, seconds_ago: i64) -> Self {
        self.task.status = TaskStatus::Processing;
        self.task.worker_id = worker_id.to_string();
        self.task.started_at = Some(Utc::now() - chrono::Duration::seconds(seconds_ago));
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

/// Worker 构建器，默认在线且心跳新鲜
pub struct WorkerBuilder {
    worker: Worker,
}

impl WorkerBuilder {
    pub fn new(worker_id: &str) -> Self {
        let mut worker = Worker::new(
            worker_id,
            worker_id,
            "127.0.0.1:9000",
            10,
            vec!["echo".to_string()],
        );
        worker.mark_online();
        Self { worker }
    }

    pub fn capacity(mut self, capacity: i32) -> Self {
        self.worker.capacity = capacity;
        self
    }

    pub fn current_load(mut self, load: i32) -> Self {
        self.worker.current_load = load;
        self
    }

    pub fn supported_types(mut self, types: &[&str]) -> Self {
        self.worker.supported_types = types.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn offline(mut self) -> Self {
        self.worker.mark_offline();
        self
    }

    pub fn heartbeat_age_seconds(mut self, seconds: i64) -> Self {
        self.worker.last_heartbeat = Utc::now() - chrono::Duration::seconds(seconds);
        self
    }

    pub fn build(self) -> Worker {
        self.worker
    }
}

/// TaskConfig 构建器
pub struct TaskConfigBuilder {
    config: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(task_type: &str) -> Self {
        let now = Utc::now();
        Self {
            config: TaskConfig {
                id: 0,
                task_type: task_type.to_string(),
                task_name: task_type.to_string(),
                description: String::new(),
                executor_type: ExecutorType::Local,
                executor_config: JsonMap::new(),
                default_timeout: 60,
                default_max_retry: 3,
                retry_strategy: RetryStrategy::Fixed,
                retry_delay: 10,
                backoff_rate: 2.0,
                max_concurrent: 10,
                enabled: true,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn executor_type(mut self, executor_type: ExecutorType) -> Self {
        self.config.executor_type = executor_type;
        self
    }

    pub fn default_timeout(mut self, timeout: i64) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    pub fn default_max_retry(mut self, max_retry: i32) -> Self {
        self.config.default_max_retry = max_retry;
        self
    }

    pub fn retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.config.retry_strategy = strategy;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.config.enabled = false;
        self
    }

    pub fn build(self) -> TaskConfig {
        self.config
    }
}
