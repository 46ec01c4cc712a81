use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use taskman_core::{
    ExecutorRegistry, Result, TaskLog, TaskLogRepository, TaskRepository, TaskStatus, Worker,
    WorkerRegistry,
};
use taskman_infrastructure::QueueManager;

/// Worker 服务构建器
pub struct WorkerServiceBuilder {
    worker: Worker,
    task_repo: Arc<dyn TaskRepository>,
    task_log_repo: Arc<dyn TaskLogRepository>,
    worker_registry: Arc<dyn WorkerRegistry>,
    queue_manager: Arc<QueueManager>,
    executor_registry: Arc<dyn ExecutorRegistry>,
    heartbeat_interval: Duration,
    poll_interval: Duration,
}

impl WorkerServiceBuilder {
    pub fn new(
        worker: Worker,
        task_repo: Arc<dyn TaskRepository>,
        task_log_repo: Arc<dyn TaskLogRepository>,
        worker_registry: Arc<dyn WorkerRegistry>,
        queue_manager: Arc<QueueManager>,
        executor_registry: Arc<dyn ExecutorRegistry>,
    ) -> Self {
        Self {
            worker,
            task_repo,
            task_log_repo,
            worker_registry,
            queue_manager,
            executor_registry,
            heartbeat_interval: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
        }
    }

    /// 设置心跳间隔
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// 设置任务轮询间隔
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn build(self) -> WorkerService {
        WorkerService {
            worker: Arc::new(RwLock::new(self.worker)),
            task_repo: self.task_repo,
            task_log_repo: self.task_log_repo,
            worker_registry: self.worker_registry,
            queue_manager: self.queue_manager,
            executor_registry: self.executor_registry,
            heartbeat_interval: self.heartbeat_interval,
            poll_interval: self.poll_interval,
        }
    }
}

/// Worker 服务
///
/// 两个协作循环并发运行：心跳循环维持注册表里的存活状态，
/// 任务循环从自己的出口队列取任务执行。负载计数只由本服务修改，
/// 注册表中的值是对外发布的副本。
pub struct WorkerService {
    worker: Arc<RwLock<Worker>>,
    task_repo: Arc<dyn TaskRepository>,
    task_log_repo: Arc<dyn TaskLogRepository>,
    worker_registry: Arc<dyn WorkerRegistry>,
    queue_manager: Arc<QueueManager>,
    executor_registry: Arc<dyn ExecutorRegistry>,
    heartbeat_interval: Duration,
    poll_interval: Duration,
}

impl Clone for WorkerService {
    fn clone(&self) -> Self {
        Self {
            worker: Arc::clone(&self.worker),
            task_repo: Arc::clone(&self.task_repo),
            task_log_repo: Arc::clone(&self.task_log_repo),
            worker_registry: Arc::clone(&self.worker_registry),
            queue_manager: Arc::clone(&self.queue_manager),
            executor_registry: Arc::clone(&self.executor_registry),
            heartbeat_interval: self.heartbeat_interval,
            poll_interval: self.poll_interval,
        }
    }
}

impl WorkerService {
    pub async fn worker_id(&self) -> String {
        self.worker.read().await.worker_id.clone()
    }

    pub async fn current_load(&self) -> i32 {
        self.worker.read().await.current_load
    }

    /// 启动 Worker：注册自身，拉起心跳循环，进入任务循环。
    /// 收到停止信号后标记离线并注销。
    pub async fn start(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let worker_id = {
            let mut worker = self.worker.write().await;
            worker.mark_online();
            worker.touch_heartbeat();
            self.worker_registry.register(&worker).await?;
            worker.worker_id.clone()
        };
        info!("Worker {worker_id} 已注册");

        let heartbeat_service = self.clone();
        let heartbeat_rx = shutdown_rx.resubscribe();
        let heartbeat_handle = tokio::spawn(async move {
            heartbeat_service.heartbeat_loop(heartbeat_rx).await;
        });

        self.task_loop(&mut shutdown_rx).await;

        if let Err(e) = heartbeat_handle.await {
            warn!("心跳任务退出异常: {e}");
        }
        if let Err(e) = self.worker_registry.remove(&worker_id).await {
            warn!("注销Worker失败: {e}");
        }
        info!("Worker {worker_id} 已停止");
        Ok(())
    }

    /// 心跳循环：周期性刷新注册表里的心跳时间
    async fn heartbeat_loop(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut ticker = interval(self.heartbeat_interval);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    // 退出前标记离线并发布最终状态
                    let snapshot = {
                        let mut worker = self.worker.write().await;
                        worker.mark_offline();
                        worker.clone()
                    };
                    if let Err(e) = self.worker_registry.update(&snapshot).await {
                        warn!("更新Worker离线状态失败: {e}");
                    }
                    info!("心跳循环收到停止信号");
                    return;
                }
                _ = ticker.tick() => {
                    let worker_id = self.worker.read().await.worker_id.clone();
                    if let Err(e) = self.worker_registry.update_heartbeat(&worker_id).await {
                        error!("更新心跳失败: {e}");
                    }
                }
            }
        }
    }

    /// 任务循环：按轮询间隔处理自己队列里的任务
    async fn task_loop(&self, shutdown_rx: &mut broadcast::Receiver<()>) {
        let mut ticker = interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("任务循环收到停止信号");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.process_task().await {
                        error!("处理任务失败: {e}");
                    }
                }
            }
        }
    }

    /// 完成一个任务后的负载回落
    async fn release_load(&self) {
        let (worker_id, load) = {
            let mut worker = self.worker.write().await;
            worker.complete_task();
            (worker.worker_id.clone(), worker.current_load)
        };
        if let Err(e) = self.worker_registry.update_load(&worker_id, load).await {
            error!("更新Worker负载失败: {e}");
        }
    }

    /// 处理一个任务：出队、取消检查、带截止期执行、落结果
    pub async fn process_task(&self) -> Result<()> {
        let worker_id = self.worker.read().await.worker_id.clone();

        let Some(task_id) = self.queue_manager.pop_from_worker_queue(&worker_id).await? else {
            return Ok(());
        };

        let mut task = self.task_repo.get_by_id(&task_id).await?;
        info!("Worker {worker_id} 开始处理任务 {task_id}");

        // 取消标记先于执行检查，已取消的任务不会调用执行器
        match self.queue_manager.check_cancel_mark(&task_id).await {
            Ok(true) => {
                task.mark_cancelled();
                if let Err(e) = self.task_repo.update(&task).await {
                    warn!("更新已取消任务失败: {e}");
                }
                if let Err(e) = self.queue_manager.remove_cancel_mark(&task_id).await {
                    warn!("清除取消标记失败: {e}");
                }
                self.release_load().await;
                info!("任务 {task_id} 已取消");
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => warn!("检查取消标记失败: {e}"),
        }

        let executor = match self.executor_registry.get(&task.task_type) {
            Ok(executor) => executor,
            Err(e) => {
                // 执行器缺失是确定性失败，不走重试
                task.mark_failed(&format!("executor not found: {}", task.task_type));
                if let Err(update_err) = self.task_repo.update(&task).await {
                    warn!("更新任务失败: {update_err}");
                }
                self.release_load().await;
                return Err(e);
            }
        };

        let deadline = Duration::from_secs(task.timeout_seconds.max(1) as u64);
        let outcome = tokio::time::timeout(deadline, executor.execute(&task)).await;

        match outcome {
            Ok(Ok(result)) => {
                task.mark_success(result);
                match self.task_repo.update(&task).await {
                    Ok(()) => {
                        let log = TaskLog::state_change(
                            &task_id,
                            Some(TaskStatus::Processing),
                            TaskStatus::Success,
                            &worker_id,
                            "Task completed successfully",
                        );
                        if let Err(e) = self.task_log_repo.create(&log).await {
                            warn!("记录任务日志失败: {e}");
                        }
                        info!("任务 {task_id} 执行成功");
                    }
                    Err(e) if e.is_conflict() => {
                        // 超时扫描抢先终结了任务，接受持久化结果
                        debug!("任务 {task_id} 已被并发终结，丢弃本次结果");
                    }
                    Err(e) => warn!("更新任务失败: {e}"),
                }
            }
            Ok(Err(exec_err)) => {
                task.mark_failed(&exec_err.to_string());
                warn!("任务 {task_id} 执行失败: {exec_err}");
                self.finish_non_success(&mut task, &worker_id, &exec_err.to_string())
                    .await;
            }
            Err(_elapsed) => {
                task.mark_timeout();
                warn!(
                    "任务 {task_id} 执行超时 ({}s)",
                    task.timeout_seconds
                );
                self.finish_non_success(&mut task, &worker_id, "Task execution timeout")
                    .await;
            }
        }

        self.release_load().await;
        Ok(())
    }

    /// 失败/超时任务的收尾：可重试则复位入队，否则落终态
    async fn finish_non_success(&self, task: &mut taskman_core::Task, worker_id: &str, detail: &str) {
        let task_id = task.task_id.clone();

        if task.can_retry() {
            task.mark_retrying();
            match self.task_repo.update(task).await {
                Ok(()) => {}
                Err(e) if e.is_conflict() => {
                    debug!("任务 {task_id} 已被并发终结，跳过重试");
                    return;
                }
                Err(e) => {
                    error!("更新任务失败: {e}");
                    return;
                }
            }

            if let Err(e) = self.queue_manager.push_task(&task_id, task.priority).await {
                error!("任务 {task_id} 重新入队失败: {e}");
            }

            let log = TaskLog::retry(
                &task_id,
                task.retry_count,
                &format!("Task failed, retry {}/{}", task.retry_count, task.max_retry),
            );
            if let Err(e) = self.task_log_repo.create(&log).await {
                warn!("记录重试日志失败: {e}");
            }
        } else {
            match self.task_repo.update(task).await {
                Ok(()) => {}
                Err(e) if e.is_conflict() => {
                    debug!("任务 {task_id} 已被并发终结");
                    return;
                }
                Err(e) => {
                    error!("更新任务失败: {e}");
                    return;
                }
            }

            let log = TaskLog::error(
                &task_id,
                worker_id,
                "Task failed and max retry reached",
                detail,
            );
            if let Err(e) = self.task_log_repo.create(&log).await {
                warn!("记录错误日志失败: {e}");
            }
        }
    }
}

impl std::fmt::Debug for WorkerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerService")
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}
