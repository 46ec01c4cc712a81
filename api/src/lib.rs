//! 任务 API 层：面向客户端的应用服务与薄 HTTP 适配

pub mod handlers;
pub mod routes;
pub mod task_service;

pub use routes::{serve, AppState};
pub use task_service::TaskService;
