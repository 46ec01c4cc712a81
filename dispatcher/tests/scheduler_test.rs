use std::sync::Arc;
use std::time::Duration;

use taskman_core::{
    CoordinationStore, LogType, TaskLogRepository, TaskPriority, TaskRepository, TaskStatus,
    WorkerRegistry,
};
use taskman_dispatcher::{LeastTaskBalancer, SchedulerService};
use taskman_dispatcher::scheduler::SchedulerTiming;
use taskman_infrastructure::{
    LeaderElection, MemoryStore, MemoryTaskLogRepository, MemoryTaskRepository, QueueManager,
    StoreWorkerRegistry,
};
use taskman_testing_utils::{TaskBuilder, WorkerBuilder};

struct Fixture {
    task_repo: Arc<MemoryTaskRepository>,
    task_log_repo: Arc<MemoryTaskLogRepository>,
    worker_registry: Arc<StoreWorkerRegistry>,
    queue_manager: Arc<QueueManager>,
    scheduler: SchedulerService,
}

fn fixture() -> Fixture {
    let store: Arc<dyn CoordinationStore> = Arc::new(MemoryStore::new());
    let task_repo = Arc::new(MemoryTaskRepository::new());
    let task_log_repo = Arc::new(MemoryTaskLogRepository::new());
    let worker_registry = Arc::new(StoreWorkerRegistry::new(store.clone()));
    let queue_manager = Arc::new(QueueManager::new(store.clone()));
    let leader_election = Arc::new(LeaderElection::new(
        store,
        "replica-test".to_string(),
        Duration::from_secs(10),
    ));

    let scheduler = SchedulerService::new(
        task_repo.clone(),
        task_log_repo.clone(),
        worker_registry.clone(),
        leader_election,
        queue_manager.clone(),
        Arc::new(LeastTaskBalancer::new()),
        SchedulerTiming::default(),
    );

    Fixture {
        task_repo,
        task_log_repo,
        worker_registry,
        queue_manager,
        scheduler,
    }
}

#[tokio::test]
async fn test_schedule_assigns_pending_task_to_worker() {
    let f = fixture();
    f.worker_registry
        .register(&WorkerBuilder::new("w1").build())
        .await
        .unwrap();

    let task = TaskBuilder::new("t1").build();
    f.task_repo.create(&task).await.unwrap();
    f.queue_manager
        .push_task("t1", TaskPriority::Normal)
        .await
        .unwrap();

    f.scheduler.scan_and_schedule().await.unwrap();

    let scheduled = f.task_repo.get_by_id("t1").await.unwrap();
    assert_eq!(scheduled.status, TaskStatus::Processing);
    assert_eq!(scheduled.worker_id, "w1");
    assert!(scheduled.started_at.is_some());

    // 任务进入 Worker 出口队列，负载加一
    assert_eq!(
        f.queue_manager.pop_from_worker_queue("w1").await.unwrap(),
        Some("t1".to_string())
    );
    assert_eq!(
        f.worker_registry.get_by_id("w1").await.unwrap().current_load,
        1
    );

    let logs = f.task_log_repo.get_by_task_id("t1").await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].log_type, LogType::StateChange);
    assert_eq!(logs[0].to_status, Some(TaskStatus::Processing));
}

#[tokio::test]
async fn test_empty_queue_is_noop() {
    let f = fixture();
    f.scheduler.scan_and_schedule().await.unwrap();
}

#[tokio::test]
async fn test_no_available_worker_requeues() {
    let f = fixture();

    let task = TaskBuilder::new("t1").build();
    f.task_repo.create(&task).await.unwrap();
    f.queue_manager
        .push_task("t1", TaskPriority::Normal)
        .await
        .unwrap();

    f.scheduler.scan_and_schedule().await.unwrap();

    // 没有 Worker：任务保持 PENDING 且回到全局队列
    assert_eq!(
        f.task_repo.get_by_id("t1").await.unwrap().status,
        TaskStatus::Pending
    );
    assert_eq!(f.queue_manager.pop_task().await.unwrap(), Some("t1".to_string()));
}

#[tokio::test]
async fn test_unhealthy_and_full_workers_are_skipped() {
    let f = fixture();
    f.worker_registry
        .register(&WorkerBuilder::new("stale").heartbeat_age_seconds(120).build())
        .await
        .unwrap();
    f.worker_registry
        .register(&WorkerBuilder::new("full").capacity(1).current_load(1).build())
        .await
        .unwrap();
    f.worker_registry
        .register(&WorkerBuilder::new("offline").offline().build())
        .await
        .unwrap();

    let task = TaskBuilder::new("t1").build();
    f.task_repo.create(&task).await.unwrap();
    f.queue_manager
        .push_task("t1", TaskPriority::Normal)
        .await
        .unwrap();

    f.scheduler.scan_and_schedule().await.unwrap();

    // 候选全部不合格，任务重新入队
    assert_eq!(
        f.task_repo.get_by_id("t1").await.unwrap().status,
        TaskStatus::Pending
    );
    assert_eq!(f.queue_manager.pop_task().await.unwrap(), Some("t1".to_string()));
}

#[tokio::test]
async fn test_cancelled_task_dropped_at_dequeue() {
    let f = fixture();
    f.worker_registry
        .register(&WorkerBuilder::new("w1").build())
        .await
        .unwrap();

    let task = TaskBuilder::new("t1").status(TaskStatus::Cancelled).build();
    f.task_repo.create(&task).await.unwrap();
    f.queue_manager
        .push_task("t1", TaskPriority::Normal)
        .await
        .unwrap();

    f.scheduler.scan_and_schedule().await.unwrap();

    // 非 PENDING 任务在出队时被丢弃，不再入任何队列
    assert_eq!(f.queue_manager.pop_task().await.unwrap(), None);
    assert_eq!(f.queue_manager.pop_from_worker_queue("w1").await.unwrap(), None);
    assert_eq!(
        f.task_repo.get_by_id("t1").await.unwrap().status,
        TaskStatus::Cancelled
    );
}

#[tokio::test]
async fn test_timeout_sweep_requeues_retryable_task() {
    let f = fixture();

    let task = TaskBuilder::new("t1")
        .max_retry(1)
        .timeout_seconds(1)
        .processing_since("w1", 10)
        .build();
    f.task_repo.create(&task).await.unwrap();

    f.scheduler.check_timeout_tasks().await.unwrap();

    let swept = f.task_repo.get_by_id("t1").await.unwrap();
    assert_eq!(swept.status, TaskStatus::Pending);
    assert_eq!(swept.retry_count, 1);
    assert!(swept.worker_id.is_empty());
    assert!(swept.started_at.is_none());

    assert_eq!(f.queue_manager.pop_task().await.unwrap(), Some("t1".to_string()));

    let logs = f.task_log_repo.get_by_task_id("t1").await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].log_type, LogType::Retry);
    assert_eq!(logs[0].retry_count, 1);
}

#[tokio::test]
async fn test_timeout_sweep_finalizes_exhausted_task() {
    let f = fixture();

    let task = TaskBuilder::new("t1")
        .max_retry(1)
        .retry_count(1)
        .timeout_seconds(1)
        .processing_since("w1", 10)
        .build();
    f.task_repo.create(&task).await.unwrap();

    f.scheduler.check_timeout_tasks().await.unwrap();

    let swept = f.task_repo.get_by_id("t1").await.unwrap();
    assert_eq!(swept.status, TaskStatus::Timeout);
    // 重试次数不会越过上限
    assert_eq!(swept.retry_count, 1);
    assert!(swept.completed_at.is_some());
    assert_eq!(swept.error_msg, "Task execution timeout");

    // 终结的任务不再入队
    assert_eq!(f.queue_manager.pop_task().await.unwrap(), None);

    let logs = f.task_log_repo.get_by_task_id("t1").await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].log_type, LogType::Error);
}

#[tokio::test]
async fn test_timeout_sweep_ignores_fresh_processing_task() {
    let f = fixture();

    let task = TaskBuilder::new("t1")
        .timeout_seconds(300)
        .processing_since("w1", 5)
        .build();
    f.task_repo.create(&task).await.unwrap();

    f.scheduler.check_timeout_tasks().await.unwrap();

    assert_eq!(
        f.task_repo.get_by_id("t1").await.unwrap().status,
        TaskStatus::Processing
    );
}
