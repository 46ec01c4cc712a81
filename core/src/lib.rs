//! 核心领域层：实体模型、错误类型、配置与抽象接口定义
//!
//! 该 crate 不依赖任何具体的存储或网络实现，所有外部协作方
//! （协调存储、持久化仓储、执行器）均以 trait 形式声明，
//! 由 `taskman-infrastructure` 提供实现。

pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use errors::{Result, TaskManError};
pub use models::{
    ExecutorType, JsonMap, LogType, RetryStrategy, Task, TaskConfig, TaskLog, TaskPriority,
    TaskStatus, Worker, WorkerStatus,
};
pub use traits::{
    CoordinationStore, Executor, ExecutorRegistry, LoadBalanceStrategy, LoadBalancer,
    TaskConfigRepository, TaskLogRepository, TaskRepository, WorkerRegistry,
};
