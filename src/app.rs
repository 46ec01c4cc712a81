use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{error, info};

use taskman_api::{AppState, TaskService};
use taskman_core::{
    AppConfig, CoordinationStore, ExecutorRegistry, LoadBalanceStrategy, TaskConfigRepository,
    TaskLogRepository, TaskRepository, Worker, WorkerRegistry,
};
use taskman_dispatcher::{make_load_balancer, SchedulerService, SchedulerTiming};
use taskman_infrastructure::{
    mysql, HttpExecutor, LeaderElection, LocalExecutor, LocalExecutorRegistry, MemoryStore,
    MemoryTaskConfigRepository, MemoryTaskLogRepository, MemoryTaskRepository, QueueManager,
    RedisStore, StoreWorkerRegistry,
};
use taskman_worker::{WorkerService, WorkerServiceBuilder};

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Api,
    Scheduler,
    Worker,
    All,
}

impl AppMode {
    fn runs_api(&self) -> bool {
        matches!(self, AppMode::Api | AppMode::All)
    }

    fn runs_scheduler(&self) -> bool {
        matches!(self, AppMode::Scheduler | AppMode::All)
    }

    fn runs_worker(&self) -> bool {
        matches!(self, AppMode::Worker | AppMode::All)
    }
}

/// 应用组装根：按配置构建存储、仓储与各角色服务
pub struct Application {
    config: AppConfig,
    scheduler: Option<Arc<SchedulerService>>,
    worker: Option<Arc<WorkerService>>,
    api_state: Option<AppState>,
}

impl Application {
    pub async fn new(config: AppConfig, mode: AppMode) -> Result<Self> {
        let store: Arc<dyn CoordinationStore> = match config.redis.driver.as_str() {
            "redis" => {
                info!("使用Redis协调存储: {}", config.redis.url);
                Arc::new(
                    RedisStore::connect(&config.redis.url)
                        .await
                        .context("初始化Redis协调存储失败")?,
                )
            }
            _ => {
                info!("使用内存协调存储（嵌入模式）");
                Arc::new(MemoryStore::new())
            }
        };

        let (task_repo, task_log_repo, task_config_repo): (
            Arc<dyn TaskRepository>,
            Arc<dyn TaskLogRepository>,
            Arc<dyn TaskConfigRepository>,
        ) = match config.database.driver.as_str() {
            "mysql" => {
                info!("使用MySQL持久化存储");
                let pool = mysql::connect_pool(&config.database)
                    .await
                    .context("初始化数据库连接池失败")?;
                (
                    Arc::new(mysql::MySqlTaskRepository::new(pool.clone())),
                    Arc::new(mysql::MySqlTaskLogRepository::new(pool.clone())),
                    Arc::new(mysql::MySqlTaskConfigRepository::new(pool)),
                )
            }
            _ => {
                info!("使用内存持久化存储（嵌入模式）");
                (
                    Arc::new(MemoryTaskRepository::new()),
                    Arc::new(MemoryTaskLogRepository::new()),
                    Arc::new(MemoryTaskConfigRepository::new()),
                )
            }
        };

        let queue_manager = Arc::new(QueueManager::new(store.clone()));
        let worker_registry: Arc<dyn WorkerRegistry> =
            Arc::new(StoreWorkerRegistry::new(store.clone()));

        let scheduler = if mode.runs_scheduler() && config.scheduler.enabled {
            let replica_id = replica_id(&config);
            let leader_election = Arc::new(LeaderElection::new(
                store.clone(),
                replica_id,
                Duration::from_secs(config.scheduler.leader_ttl_seconds),
            ));
            let timing = SchedulerTiming {
                scan_interval: Duration::from_millis(config.scheduler.scan_interval_ms),
                timeout_check_interval: Duration::from_secs(
                    config.scheduler.timeout_check_interval_seconds,
                ),
                leader_poll_interval: Duration::from_secs(
                    config.scheduler.leader_poll_interval_seconds,
                ),
                leader_renew_interval: Duration::from_secs(
                    config.scheduler.leader_renew_interval_seconds,
                ),
                heartbeat_timeout: chrono::Duration::seconds(
                    config.worker.heartbeat_timeout_seconds as i64,
                ),
            };
            let load_balancer = make_load_balancer(LoadBalanceStrategy::parse(
                &config.scheduler.load_balance_strategy,
            ));

            Some(Arc::new(SchedulerService::new(
                task_repo.clone(),
                task_log_repo.clone(),
                worker_registry.clone(),
                leader_election,
                queue_manager.clone(),
                load_balancer,
                timing,
            )))
        } else {
            None
        };

        let worker = if mode.runs_worker() && config.worker.enabled {
            let executor_registry: Arc<dyn ExecutorRegistry> =
                Arc::new(LocalExecutorRegistry::new());
            executor_registry
                .register(Arc::new(LocalExecutor::with_builtin_handlers()))
                .context("注册本地执行器失败")?;
            executor_registry
                .register(Arc::new(HttpExecutor::new()))
                .context("注册HTTP执行器失败")?;

            // 未显式配置时默认支持所有已注册的执行器类型
            let supported_types = if config.worker.supported_types.is_empty() {
                executor_registry.list_task_types()
            } else {
                config.worker.supported_types.clone()
            };

            let worker = Worker::new(
                &config.worker.worker_id,
                &config.worker.worker_name,
                &config.worker.address,
                config.worker.capacity,
                supported_types,
            );

            let service = WorkerServiceBuilder::new(
                worker,
                task_repo.clone(),
                task_log_repo.clone(),
                worker_registry.clone(),
                queue_manager.clone(),
                executor_registry,
            )
            .heartbeat_interval(Duration::from_secs(config.worker.heartbeat_interval_seconds))
            .poll_interval(Duration::from_millis(config.worker.queue_poll_interval_ms))
            .build();

            Some(Arc::new(service))
        } else {
            None
        };

        let api_state = if mode.runs_api() && config.api.enabled {
            let task_service = Arc::new(TaskService::new(
                task_repo,
                task_log_repo,
                task_config_repo,
                queue_manager,
            ));
            Some(AppState { task_service })
        } else {
            None
        };

        Ok(Self {
            config,
            scheduler,
            worker,
            api_state,
        })
    }

    /// 启动所有已启用的角色并等待它们退出
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let mut handles = Vec::new();

        if let Some(scheduler) = &self.scheduler {
            let scheduler = Arc::clone(scheduler);
            let rx = shutdown_rx.resubscribe();
            handles.push(tokio::spawn(async move {
                if let Err(e) = scheduler.run(rx).await {
                    error!("调度服务退出: {e}");
                }
            }));
        }

        if let Some(worker) = &self.worker {
            let worker = Arc::clone(worker);
            let rx = shutdown_rx.resubscribe();
            handles.push(tokio::spawn(async move {
                if let Err(e) = worker.start(rx).await {
                    error!("Worker服务退出: {e}");
                }
            }));
        }

        if let Some(state) = &self.api_state {
            let state = state.clone();
            let bind_address = self.config.api.bind_address.clone();
            let rx = shutdown_rx.resubscribe();
            handles.push(tokio::spawn(async move {
                if let Err(e) = taskman_api::serve(state, &bind_address, rx).await {
                    error!("API服务退出: {e}");
                }
            }));
        }

        if handles.is_empty() {
            anyhow::bail!("当前模式下没有任何已启用的角色");
        }

        for handle in handles {
            let _ = handle.await;
        }
        Ok(())
    }
}

/// 副本ID：主机名 + 进程号，保证同机多副本也不冲突
fn replica_id(config: &AppConfig) -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| config.app.name.clone());
    format!("{host}-{}", std::process::id())
}
