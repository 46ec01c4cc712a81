use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use taskman_core::{Result, TaskManError};

use crate::handlers;
use crate::task_service::TaskService;

/// HTTP 层共享状态
#[derive(Clone)]
pub struct AppState {
    pub task_service: Arc<TaskService>,
}

/// 组装路由
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/tasks", post(handlers::create_task))
        .route("/api/tasks/:task_id", get(handlers::get_task))
        .route("/api/tasks/:task_id/cancel", post(handlers::cancel_task))
        .route("/api/tasks/:task_id/logs", get(handlers::get_task_logs))
        .with_state(state)
}

/// 启动 HTTP 服务，收到停止信号后优雅退出
pub async fn serve(
    state: AppState,
    bind_address: &str,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .map_err(|e| TaskManError::Internal(format!("绑定地址 {bind_address} 失败: {e}")))?;

    info!("API服务监听 {bind_address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("API服务收到停止信号");
        })
        .await
        .map_err(|e| TaskManError::Internal(format!("API服务异常退出: {e}")))
}
