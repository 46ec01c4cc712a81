mod store;
mod task_config_repository;
mod task_log_repository;
mod task_repository;

pub use store::MemoryStore;
pub use task_config_repository::MemoryTaskConfigRepository;
pub use task_log_repository::MemoryTaskLogRepository;
pub use task_repository::MemoryTaskRepository;
