use async_trait::async_trait;

use taskman_core::{Executor, ExecutorType, JsonMap, Result, Task, TaskManError};

/// HTTP 执行器
///
/// 从任务载荷解析请求参数并发起 HTTP 调用：
/// - `url`（必填）
/// - `method`（默认 POST）
/// - `body`（可选，JSON 序列化后作为请求体）
///
/// 截止期由 Worker 在外层施加，客户端本身不设超时。
pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    async fn execute(&self, task: &Task) -> Result<JsonMap> {
        let url = task
            .payload
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| TaskManError::TaskExecution("url is required in payload".to_string()))?;

        let method = task
            .payload
            .get("method")
            .and_then(|v| v.as_str())
            .unwrap_or("POST");
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| TaskManError::TaskExecution(format!("invalid http method: {method}")))?;

        let mut request = self
            .client
            .request(method, url)
            .header("Content-Type", "application/json");
        if let Some(body) = task.payload.get("body") {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TaskManError::TaskExecution(format!("send request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TaskManError::TaskExecution(format!("read response failed: {e}")))?;

        if status.as_u16() >= 400 {
            return Err(TaskManError::TaskExecution(format!(
                "http request failed: {status}"
            )));
        }

        let mut result = JsonMap::new();
        result.insert(
            "status_code".to_string(),
            serde_json::json!(status.as_u16()),
        );
        result.insert("body".to_string(), serde_json::json!(body));
        Ok(result)
    }

    fn executor_type(&self) -> ExecutorType {
        ExecutorType::Http
    }

    fn supported_task_types(&self) -> Vec<String> {
        vec!["http_request".to_string(), "webhook".to_string()]
    }
}
