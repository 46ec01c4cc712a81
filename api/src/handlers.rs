use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use taskman_core::{JsonMap, TaskManError, TaskPriority};

use crate::routes::AppState;

/// API 错误：把领域错误映射到 HTTP 状态码
pub struct ApiError(TaskManError);

impl From<TaskManError> for ApiError {
    fn from(err: TaskManError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            e if e.is_not_found() => StatusCode::NOT_FOUND,
            e if e.is_conflict() => StatusCode::CONFLICT,
            TaskManError::StoreUnavailable(_) | TaskManError::Database(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub task_type: String,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub payload: JsonMap,
}

/// POST /api/tasks
pub async fn create_task(
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<Response, ApiError> {
    let task = state
        .task_service
        .create_task(&req.task_type, req.priority, req.payload)
        .await?;
    Ok((StatusCode::CREATED, Json(task)).into_response())
}

/// GET /api/tasks/{task_id}
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Response, ApiError> {
    let task = state.task_service.get_task(&task_id).await?;
    Ok(Json(task).into_response())
}

/// POST /api/tasks/{task_id}/cancel
pub async fn cancel_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Response, ApiError> {
    state.task_service.cancel_task(&task_id).await?;
    Ok(Json(json!({ "task_id": task_id, "cancelled": true })).into_response())
}

/// GET /api/tasks/{task_id}/logs
pub async fn get_task_logs(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Response, ApiError> {
    let logs = state.task_service.get_task_logs(&task_id).await?;
    Ok(Json(logs).into_response())
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
