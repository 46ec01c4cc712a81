mod task;
mod task_config;
mod task_log;
mod worker;

pub use task::{JsonMap, Task, TaskPriority, TaskStatus};
pub use task_config::{ExecutorType, RetryStrategy, TaskConfig};
pub use task_log::{LogType, TaskLog};
pub use worker::{Worker, WorkerStatus};
