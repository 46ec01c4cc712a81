//! 基础设施层：协调存储、协调原语、持久化仓储与任务执行器
//!
//! 协调原语（领导者选举、队列管理、Worker 注册表）全部建立在
//! [`CoordinationStore`](taskman_core::CoordinationStore) 之上，
//! 可以无差别地运行在 Redis 或内存实现上。

pub mod coordination;
pub mod executor;
pub mod memory;
pub mod mysql;
pub mod redis;

pub use coordination::{LeaderElection, QueueManager, StoreWorkerRegistry};
pub use executor::{HttpExecutor, LocalExecutor, LocalExecutorRegistry};
pub use memory::{
    MemoryStore, MemoryTaskConfigRepository, MemoryTaskLogRepository, MemoryTaskRepository,
};
pub use self::redis::RedisStore;
