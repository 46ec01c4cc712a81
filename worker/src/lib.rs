//! Worker 层：自注册、心跳维持与任务执行循环

pub mod service;

pub use service::{WorkerService, WorkerServiceBuilder};
