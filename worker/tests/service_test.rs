use std::sync::Arc;
use std::time::Duration;

use taskman_core::{
    CoordinationStore, ExecutorRegistry, JsonMap, LogType, TaskLogRepository, TaskManError,
    TaskRepository, TaskStatus, WorkerRegistry,
};
use taskman_infrastructure::{
    LocalExecutor, LocalExecutorRegistry, MemoryStore, MemoryTaskLogRepository,
    MemoryTaskRepository, QueueManager, StoreWorkerRegistry,
};
use taskman_testing_utils::{TaskBuilder, WorkerBuilder};
use taskman_worker::WorkerServiceBuilder;

struct Fixture {
    task_repo: Arc<MemoryTaskRepository>,
    task_log_repo: Arc<MemoryTaskLogRepository>,
    worker_registry: Arc<StoreWorkerRegistry>,
    queue_manager: Arc<QueueManager>,
    service: taskman_worker::WorkerService,
}

fn fixture_with_executor(executor: LocalExecutor) -> Fixture {
    let store: Arc<dyn CoordinationStore> = Arc::new(MemoryStore::new());
    let task_repo = Arc::new(MemoryTaskRepository::new());
    let task_log_repo = Arc::new(MemoryTaskLogRepository::new());
    let worker_registry = Arc::new(StoreWorkerRegistry::new(store.clone()));
    let queue_manager = Arc::new(QueueManager::new(store));

    let executor_registry = Arc::new(LocalExecutorRegistry::new());
    executor_registry.register(Arc::new(executor)).unwrap();

    let worker = WorkerBuilder::new("w1")
        .capacity(2)
        .supported_types(&["echo", "boom", "slow"])
        .build();

    let service = WorkerServiceBuilder::new(
        worker,
        task_repo.clone(),
        task_log_repo.clone(),
        worker_registry.clone(),
        queue_manager.clone(),
        executor_registry,
    )
    .heartbeat_interval(Duration::from_secs(10))
    .poll_interval(Duration::from_millis(10))
    .build();

    Fixture {
        task_repo,
        task_log_repo,
        worker_registry,
        queue_manager,
        service,
    }
}

fn fixture() -> Fixture {
    let mut executor = LocalExecutor::new();
    executor.register_handler("echo", |payload| async move {
        let mut result = JsonMap::new();
        result.insert("ok".to_string(), serde_json::json!(true));
        result.extend(payload);
        Ok(result)
    });
    executor.register_handler("boom", |_| async {
        Err(TaskManError::TaskExecution("boom".to_string()))
    });
    executor.register_handler("slow", |payload| async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(payload)
    });
    fixture_with_executor(executor)
}

/// 把任务置为 PROCESSING 并投递到 w1 的队列，模拟调度器的分派
async fn dispatch(f: &Fixture, task: taskman_core::Task) {
    f.task_repo.create(&task).await.unwrap();
    let mut assigned = f.task_repo.get_by_id(&task.task_id).await.unwrap();
    assigned.mark_processing("w1");
    f.task_repo.update(&assigned).await.unwrap();
    f.queue_manager
        .push_to_worker_queue("w1", &task.task_id)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_empty_queue_is_noop() {
    let f = fixture();
    f.service.process_task().await.unwrap();
}

#[tokio::test]
async fn test_successful_execution() {
    let f = fixture();
    f.worker_registry
        .register(&WorkerBuilder::new("w1").current_load(1).build())
        .await
        .unwrap();

    dispatch(
        &f,
        TaskBuilder::new("t1")
            .task_type("echo")
            .payload_entry("x", serde_json::json!(1))
            .build(),
    )
    .await;

    f.service.process_task().await.unwrap();

    let done = f.task_repo.get_by_id("t1").await.unwrap();
    assert_eq!(done.status, TaskStatus::Success);
    assert_eq!(done.result.get("ok"), Some(&serde_json::json!(true)));
    assert_eq!(done.result.get("x"), Some(&serde_json::json!(1)));
    assert!(done.completed_at.is_some());

    let logs = f.task_log_repo.get_by_task_id("t1").await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].log_type, LogType::StateChange);
    assert_eq!(logs[0].to_status, Some(TaskStatus::Success));

    // 执行结束后负载回落并发布到注册表
    assert_eq!(f.service.current_load().await, 0);
}

#[tokio::test]
async fn test_cancel_mark_short_circuits_execution() {
    let f = fixture();
    f.worker_registry
        .register(&WorkerBuilder::new("w1").current_load(1).build())
        .await
        .unwrap();

    dispatch(&f, TaskBuilder::new("t1").task_type("echo").build()).await;
    f.queue_manager.set_cancel_mark("t1").await.unwrap();

    f.service.process_task().await.unwrap();

    let cancelled = f.task_repo.get_by_id("t1").await.unwrap();
    assert_eq!(cancelled.status, TaskStatus::Cancelled);
    assert!(cancelled.completed_at.is_some());
    // 执行器未被调用，结果为空
    assert!(cancelled.result.is_empty());
    // 标记已清除
    assert!(!f.queue_manager.check_cancel_mark("t1").await.unwrap());
}

#[tokio::test]
async fn test_missing_executor_fails_without_retry() {
    let f = fixture();
    f.worker_registry
        .register(&WorkerBuilder::new("w1").current_load(1).build())
        .await
        .unwrap();

    dispatch(
        &f,
        TaskBuilder::new("t1").task_type("unknown_type").max_retry(3).build(),
    )
    .await;

    let err = f.service.process_task().await.unwrap_err();
    assert!(matches!(err, TaskManError::ExecutorNotFound { .. }));

    // 确定性失败：不重试，直接 FAILED
    let failed = f.task_repo.get_by_id("t1").await.unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);
    assert_eq!(failed.retry_count, 0);
    assert!(failed.error_msg.contains("executor not found"));
}

#[tokio::test]
async fn test_failed_task_resets_for_retry() {
    let f = fixture();
    f.worker_registry
        .register(&WorkerBuilder::new("w1").current_load(1).build())
        .await
        .unwrap();

    dispatch(&f, TaskBuilder::new("t1").task_type("boom").max_retry(2).build()).await;

    f.service.process_task().await.unwrap();

    let retried = f.task_repo.get_by_id("t1").await.unwrap();
    assert_eq!(retried.status, TaskStatus::Pending);
    assert_eq!(retried.retry_count, 1);
    assert!(retried.worker_id.is_empty());
    assert!(retried.started_at.is_none());

    // 任务回到全局队列等待重新调度
    assert_eq!(
        f.queue_manager.pop_task().await.unwrap(),
        Some("t1".to_string())
    );

    let logs = f.task_log_repo.get_by_task_id("t1").await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].log_type, LogType::Retry);
}

#[tokio::test]
async fn test_failed_task_with_exhausted_retries_is_terminal() {
    let f = fixture();
    f.worker_registry
        .register(&WorkerBuilder::new("w1").current_load(1).build())
        .await
        .unwrap();

    dispatch(&f, TaskBuilder::new("t1").task_type("boom").max_retry(0).build()).await;

    f.service.process_task().await.unwrap();

    let failed = f.task_repo.get_by_id("t1").await.unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);
    assert_eq!(failed.retry_count, 0);
    assert!(failed.completed_at.is_some());

    assert_eq!(f.queue_manager.pop_task().await.unwrap(), None);

    let logs = f.task_log_repo.get_by_task_id("t1").await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].log_type, LogType::Error);
    assert_eq!(logs[0].message, "Task failed and max retry reached");
}

#[tokio::test(start_paused = true)]
async fn test_deadline_exceeded_becomes_timeout_then_retries() {
    let f = fixture();
    f.worker_registry
        .register(&WorkerBuilder::new("w1").current_load(1).build())
        .await
        .unwrap();

    // slow 执行器睡 5 秒，任务时限 1 秒
    dispatch(
        &f,
        TaskBuilder::new("t1")
            .task_type("slow")
            .timeout_seconds(1)
            .max_retry(1)
            .build(),
    )
    .await;

    f.service.process_task().await.unwrap();

    let timed_out = f.task_repo.get_by_id("t1").await.unwrap();
    assert_eq!(timed_out.status, TaskStatus::Pending);
    assert_eq!(timed_out.retry_count, 1);
    assert_eq!(
        f.queue_manager.pop_task().await.unwrap(),
        Some("t1".to_string())
    );
}
