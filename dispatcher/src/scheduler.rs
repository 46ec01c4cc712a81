use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use taskman_core::{
    LoadBalancer, Result, TaskLog, TaskLogRepository, TaskPriority, TaskRepository, TaskStatus,
    WorkerRegistry,
};
use taskman_infrastructure::{LeaderElection, QueueManager};

/// 调度循环的时间参数
#[derive(Debug, Clone)]
pub struct SchedulerTiming {
    pub scan_interval: Duration,
    pub timeout_check_interval: Duration,
    pub leader_poll_interval: Duration,
    pub leader_renew_interval: Duration,
    pub heartbeat_timeout: chrono::Duration,
}

impl Default for SchedulerTiming {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_millis(100),
            timeout_check_interval: Duration::from_secs(30),
            leader_poll_interval: Duration::from_secs(3),
            leader_renew_interval: Duration::from_secs(3),
            heartbeat_timeout: chrono::Duration::seconds(30),
        }
    }
}

enum LeaderExit {
    Shutdown,
    Demoted,
}

/// 调度服务
///
/// 所有副本都运行 `run`，但只有抢到 Leader 租约的副本进入调度循环。
/// 调度循环内三个独立节拍的定时器：任务扫描、租约续约、超时扫描。
/// 续约失败立即自降级，回到跟随者轮询。
pub struct SchedulerService {
    task_repo: Arc<dyn TaskRepository>,
    task_log_repo: Arc<dyn TaskLogRepository>,
    worker_registry: Arc<dyn WorkerRegistry>,
    leader_election: Arc<LeaderElection>,
    queue_manager: Arc<QueueManager>,
    load_balancer: Arc<dyn LoadBalancer>,
    timing: SchedulerTiming,
}

impl SchedulerService {
    pub fn new(
        task_repo: Arc<dyn TaskRepository>,
        task_log_repo: Arc<dyn TaskLogRepository>,
        worker_registry: Arc<dyn WorkerRegistry>,
        leader_election: Arc<LeaderElection>,
        queue_manager: Arc<QueueManager>,
        load_balancer: Arc<dyn LoadBalancer>,
        timing: SchedulerTiming,
    ) -> Self {
        Self {
            task_repo,
            task_log_repo,
            worker_registry,
            leader_election,
            queue_manager,
            load_balancer,
            timing,
        }
    }

    /// 跟随者轮询：周期性尝试抢占 Leader 锁，抢到后进入调度循环
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!(
            "调度服务启动，副本ID: {}，负载均衡策略: {}",
            self.leader_election.scheduler_id(),
            self.load_balancer.name()
        );

        let mut poll = interval(self.timing.leader_poll_interval);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("调度服务收到停止信号");
                    return Ok(());
                }
                _ = poll.tick() => {
                    match self.leader_election.try_acquire().await {
                        Ok(true) => {
                            info!("成为Leader，开始调度循环");
                            match self.run_as_leader(&mut shutdown_rx).await {
                                LeaderExit::Shutdown => {
                                    if let Err(e) = self.leader_election.release().await {
                                        warn!("释放Leader锁失败: {e}");
                                    }
                                    info!("调度服务收到停止信号");
                                    return Ok(());
                                }
                                LeaderExit::Demoted => {
                                    warn!("失去领导权，回到跟随者轮询");
                                }
                            }
                        }
                        Ok(false) => {}
                        Err(e) => warn!("尝试获取Leader锁失败: {e}"),
                    }
                }
            }
        }
    }

    /// 作为 Leader 运行，直至续约失败或收到停止信号
    async fn run_as_leader(&self, shutdown_rx: &mut broadcast::Receiver<()>) -> LeaderExit {
        let mut scan_ticker = interval(self.timing.scan_interval);
        let mut renew_ticker = interval(self.timing.leader_renew_interval);
        let mut timeout_ticker = interval(self.timing.timeout_check_interval);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    return LeaderExit::Shutdown;
                }
                _ = renew_ticker.tick() => {
                    if let Err(e) = self.leader_election.renew().await {
                        error!("续约Leader锁失败: {e}");
                        return LeaderExit::Demoted;
                    }
                }
                _ = scan_ticker.tick() => {
                    if let Err(e) = self.scan_and_schedule().await {
                        warn!("扫描调度失败: {e}");
                    }
                }
                _ = timeout_ticker.tick() => {
                    if let Err(e) = self.check_timeout_tasks().await {
                        warn!("超时任务检查失败: {e}");
                    }
                }
            }
        }
    }

    /// 重新入队，分派失败时保证任务不丢（尽力而为）
    async fn requeue(&self, task_id: &str, priority: TaskPriority) {
        if let Err(e) = self.queue_manager.push_task(task_id, priority).await {
            error!("任务 {task_id} 重新入队失败: {e}");
        }
    }

    /// 单次扫描：从全局队列取一个任务并分派到 Worker
    pub async fn scan_and_schedule(&self) -> Result<()> {
        let Some(task_id) = self.queue_manager.pop_task().await? else {
            return Ok(());
        };

        let mut task = match self.task_repo.get_by_id(&task_id).await {
            Ok(task) => task,
            Err(e) => {
                error!("获取任务 {task_id} 失败: {e}");
                return Err(e);
            }
        };

        // 已被取消或状态异常的任务直接丢弃
        if task.status != TaskStatus::Pending {
            debug!("任务 {task_id} 状态为 {}，跳过调度", task.status);
            return Ok(());
        }

        let workers = match self.worker_registry.find_by_task_type(&task.task_type).await {
            Ok(workers) => workers,
            Err(e) => {
                error!("查找Worker失败: {e}");
                self.requeue(&task_id, task.priority).await;
                return Err(e);
            }
        };

        let candidates: Vec<_> = workers
            .into_iter()
            .filter(|w| w.is_healthy(self.timing.heartbeat_timeout) && w.can_accept_task())
            .collect();

        if candidates.is_empty() {
            debug!("任务 {task_id} 没有可用的Worker，重新入队");
            self.requeue(&task_id, task.priority).await;
            return Ok(());
        }

        let worker = match self.load_balancer.select(&candidates, &task_id) {
            Ok(worker) => worker.clone(),
            Err(e) => {
                warn!("选择Worker失败: {e}");
                self.requeue(&task_id, task.priority).await;
                return Err(e);
            }
        };

        task.mark_processing(&worker.worker_id);
        if let Err(e) = self.task_repo.update(&task).await {
            error!("更新任务 {task_id} 状态失败: {e}");
            self.requeue(&task_id, task.priority).await;
            return Err(e);
        }

        // 任务已标记为处理中；此后推送失败不回滚，由超时扫描兜底恢复
        if let Err(e) = self
            .queue_manager
            .push_to_worker_queue(&worker.worker_id, &task_id)
            .await
        {
            error!("推送任务 {task_id} 到Worker队列失败: {e}");
            return Err(e);
        }

        if let Err(e) = self
            .worker_registry
            .update_load(&worker.worker_id, worker.current_load + 1)
            .await
        {
            warn!("更新Worker {} 负载失败: {e}", worker.worker_id);
        }

        let log = TaskLog::state_change(
            &task_id,
            Some(TaskStatus::Pending),
            TaskStatus::Processing,
            &worker.worker_id,
            "Task assigned to worker",
        );
        if let Err(e) = self.task_log_repo.create(&log).await {
            warn!("记录任务日志失败: {e}");
        }

        info!("任务 {task_id} 已调度到Worker {}", worker.worker_id);
        Ok(())
    }

    /// 超时扫描：把执行超限的任务置为 TIMEOUT，按重试策略复位或终结
    pub async fn check_timeout_tasks(&self) -> Result<()> {
        let tasks = self.task_repo.find_timeout_tasks().await?;

        for mut task in tasks {
            info!("任务 {} 执行超时", task.task_id);
            let worker_id = task.worker_id.clone();
            task.mark_timeout();

            if task.can_retry() {
                task.mark_retrying();
                match self.task_repo.update(&task).await {
                    Ok(()) => {}
                    Err(e) if e.is_conflict() => {
                        // Worker 已抢先写入终态，接受持久化结果
                        debug!("任务 {} 已被并发更新，跳过超时处理", task.task_id);
                        continue;
                    }
                    Err(e) => {
                        error!("更新超时任务 {} 失败: {e}", task.task_id);
                        continue;
                    }
                }

                if let Err(e) = self
                    .queue_manager
                    .push_task(&task.task_id, task.priority)
                    .await
                {
                    error!("超时任务 {} 重新入队失败: {e}", task.task_id);
                }

                let log = TaskLog::retry(
                    &task.task_id,
                    task.retry_count,
                    &format!("Task timeout, retry {}/{}", task.retry_count, task.max_retry),
                );
                if let Err(e) = self.task_log_repo.create(&log).await {
                    warn!("记录重试日志失败: {e}");
                }
            } else {
                match self.task_repo.update(&task).await {
                    Ok(()) => {}
                    Err(e) if e.is_conflict() => {
                        debug!("任务 {} 已被并发更新，跳过超时处理", task.task_id);
                        continue;
                    }
                    Err(e) => {
                        error!("更新超时任务 {} 失败: {e}", task.task_id);
                        continue;
                    }
                }

                let log = TaskLog::error(
                    &task.task_id,
                    &worker_id,
                    "Task timeout and max retry reached",
                    "",
                );
                if let Err(e) = self.task_log_repo.create(&log).await {
                    warn!("记录错误日志失败: {e}");
                }
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for SchedulerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerService")
            .field("scheduler_id", &self.leader_election.scheduler_id())
            .field("strategy", &self.load_balancer.name())
            .field("timing", &self.timing)
            .finish()
    }
}
