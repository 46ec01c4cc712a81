use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use taskman_core::{LoadBalanceStrategy, LoadBalancer, Result, TaskManError, Worker};

fn accept_capable(workers: &[Worker]) -> Vec<&Worker> {
    workers.iter().filter(|w| w.can_accept_task()).collect()
}

/// 最少任务优先：在可接收任务的 Worker 中取当前负载最小者，
/// 负载相同时先遇到者胜出。
pub struct LeastTaskBalancer;

impl LeastTaskBalancer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LeastTaskBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer for LeastTaskBalancer {
    fn select<'a>(&self, workers: &'a [Worker], _task_id: &str) -> Result<&'a Worker> {
        let mut selected: Option<&Worker> = None;
        for worker in workers {
            if !worker.can_accept_task() {
                continue;
            }
            match selected {
                Some(current) if worker.current_load >= current.current_load => {}
                _ => selected = Some(worker),
            }
        }

        let worker = selected.ok_or(TaskManError::NoAvailableWorker)?;
        debug!(
            "最少任务策略选择Worker: {} (负载: {}/{})",
            worker.worker_id, worker.current_load, worker.capacity
        );
        Ok(worker)
    }

    fn name(&self) -> &'static str {
        "least_task"
    }
}

/// 轮询：原子计数器对可用 Worker 数取模
pub struct RoundRobinBalancer {
    counter: AtomicUsize,
}

impl RoundRobinBalancer {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }
}

impl Default for RoundRobinBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer for RoundRobinBalancer {
    fn select<'a>(&self, workers: &'a [Worker], _task_id: &str) -> Result<&'a Worker> {
        let available = accept_capable(workers);
        if available.is_empty() {
            return Err(TaskManError::NoAvailableWorker);
        }

        let index = self.counter.fetch_add(1, Ordering::Relaxed) % available.len();
        let worker = available[index];
        debug!(
            "轮询策略选择Worker: {} (索引: {}/{})",
            worker.worker_id,
            index,
            available.len()
        );
        Ok(worker)
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}

/// 一致性哈希：对 task_id 做 IEEE CRC-32 后对可用 Worker 数取模。
/// 相同的 task_id 在候选集不变时映射到同一个 Worker；
/// 候选集变化会整体移位，这是 hash-mod-N 的已知性质。
pub struct ConsistentHashBalancer;

impl ConsistentHashBalancer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsistentHashBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer for ConsistentHashBalancer {
    fn select<'a>(&self, workers: &'a [Worker], task_id: &str) -> Result<&'a Worker> {
        let available = accept_capable(workers);
        if available.is_empty() {
            return Err(TaskManError::NoAvailableWorker);
        }

        let hash = crc32fast::hash(task_id.as_bytes());
        let index = hash as usize % available.len();
        let worker = available[index];
        debug!(
            "一致性哈希策略选择Worker: {} (hash: {}, 索引: {})",
            worker.worker_id, hash, index
        );
        Ok(worker)
    }

    fn name(&self) -> &'static str {
        "consistent_hash"
    }
}

/// 按配置的策略名称创建负载均衡器
pub fn make_load_balancer(strategy: LoadBalanceStrategy) -> Arc<dyn LoadBalancer> {
    match strategy {
        LoadBalanceStrategy::RoundRobin => Arc::new(RoundRobinBalancer::new()),
        LoadBalanceStrategy::ConsistentHash => Arc::new(ConsistentHashBalancer::new()),
        LoadBalanceStrategy::LeastTask => Arc::new(LeastTaskBalancer::new()),
    }
}
