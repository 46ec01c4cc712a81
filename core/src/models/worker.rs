use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Worker 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    Online,
    Offline,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Online => "ONLINE",
            WorkerStatus::Offline => "OFFLINE",
        }
    }
}

/// 工作节点（聚合根）
///
/// Worker 记录由其宿主进程创建并通过心跳维持，其它组件仅凭
/// `worker_id` 引用。负载计数只允许拥有该记录的进程修改。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Worker {
    pub worker_id: String,
    pub worker_name: String,
    pub address: String,
    pub status: WorkerStatus,
    pub capacity: i32,
    pub current_load: i32,
    pub supported_types: Vec<String>,
    pub last_heartbeat: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Worker {
    pub fn new(
        worker_id: &str,
        worker_name: &str,
        address: &str,
        capacity: i32,
        supported_types: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            worker_id: worker_id.to_string(),
            worker_name: worker_name.to_string(),
            address: address.to_string(),
            status: WorkerStatus::Offline,
            capacity,
            current_load: 0,
            supported_types,
            last_heartbeat: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// 判断 Worker 是否健康：心跳间隔不超过阈值且状态在线。
    /// 心跳恰好等于阈值视为健康（闭区间）。
    pub fn is_healthy(&self, heartbeat_timeout: Duration) -> bool {
        self.status == WorkerStatus::Online && Utc::now() - self.last_heartbeat <= heartbeat_timeout
    }

    /// 判断是否可以接受新任务
    pub fn can_accept_task(&self) -> bool {
        self.status == WorkerStatus::Online && self.current_load < self.capacity
    }

    /// 接受任务，负载加一
    pub fn accept_task(&mut self) {
        self.current_load += 1;
    }

    /// 完成任务，负载减一（不会低于零）
    pub fn complete_task(&mut self) {
        if self.current_load > 0 {
            self.current_load -= 1;
        }
    }

    /// 刷新心跳时间
    pub fn touch_heartbeat(&mut self) {
        self.last_heartbeat = Utc::now();
    }

    pub fn supports_task_type(&self, task_type: &str) -> bool {
        self.supported_types.iter().any(|t| t == task_type)
    }

    pub fn mark_online(&mut self) {
        self.status = WorkerStatus::Online;
    }

    pub fn mark_offline(&mut self) {
        self.status = WorkerStatus::Offline;
    }
}
