use crate::errors::Result;
use crate::models::Worker;

/// 负载均衡策略名称
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadBalanceStrategy {
    LeastTask,
    RoundRobin,
    ConsistentHash,
}

impl LoadBalanceStrategy {
    /// 从配置字符串解析，未知取值回退到 least_task
    pub fn parse(s: &str) -> LoadBalanceStrategy {
        match s {
            "round_robin" => LoadBalanceStrategy::RoundRobin,
            "consistent_hash" => LoadBalanceStrategy::ConsistentHash,
            _ => LoadBalanceStrategy::LeastTask,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoadBalanceStrategy::LeastTask => "least_task",
            LoadBalanceStrategy::RoundRobin => "round_robin",
            LoadBalanceStrategy::ConsistentHash => "consistent_hash",
        }
    }
}

/// 负载均衡器接口
///
/// 在候选 Worker 中选出一个接收任务。所有实现都先按
/// `can_accept_task` 过滤，候选为空时返回 `NoAvailableWorker`。
pub trait LoadBalancer: Send + Sync {
    fn select<'a>(&self, workers: &'a [Worker], task_id: &str) -> Result<&'a Worker>;

    fn name(&self) -> &'static str;
}
