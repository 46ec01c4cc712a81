use std::sync::Arc;

use taskman_core::{
    CoordinationStore, JsonMap, LogType, TaskConfigRepository, TaskPriority, TaskRepository,
    TaskStatus,
};
use taskman_api::TaskService;
use taskman_infrastructure::{
    MemoryStore, MemoryTaskConfigRepository, MemoryTaskLogRepository, MemoryTaskRepository,
    QueueManager,
};
use taskman_testing_utils::{TaskBuilder, TaskConfigBuilder};

struct Fixture {
    task_repo: Arc<MemoryTaskRepository>,
    config_repo: Arc<MemoryTaskConfigRepository>,
    queue_manager: Arc<QueueManager>,
    service: TaskService,
}

fn fixture() -> Fixture {
    let store: Arc<dyn CoordinationStore> = Arc::new(MemoryStore::new());
    let task_repo = Arc::new(MemoryTaskRepository::new());
    let task_log_repo = Arc::new(MemoryTaskLogRepository::new());
    let config_repo = Arc::new(MemoryTaskConfigRepository::new());
    let queue_manager = Arc::new(QueueManager::new(store));

    let service = TaskService::new(
        task_repo.clone(),
        task_log_repo,
        config_repo.clone(),
        queue_manager.clone(),
    );

    Fixture {
        task_repo,
        config_repo,
        queue_manager,
        service,
    }
}

#[tokio::test]
async fn test_create_task_happy_path() {
    let f = fixture();
    f.config_repo
        .create(
            &TaskConfigBuilder::new("echo")
                .default_timeout(120)
                .default_max_retry(2)
                .build(),
        )
        .await
        .unwrap();

    let mut payload = JsonMap::new();
    payload.insert("x".to_string(), serde_json::json!(1));

    let task = f
        .service
        .create_task("echo", TaskPriority::Normal, payload.clone())
        .await
        .unwrap();

    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.timeout_seconds, 120);
    assert_eq!(task.max_retry, 2);
    assert!(!task.task_id.is_empty());

    // 创建即查询，除服务端时间戳外两者一致
    let loaded = f.service.get_task(&task.task_id).await.unwrap();
    assert_eq!(loaded.task_id, task.task_id);
    assert_eq!(loaded.payload, payload);
    assert_eq!(loaded.status, TaskStatus::Pending);

    // 任务已推入全局队列
    assert_eq!(
        f.queue_manager.pop_task().await.unwrap(),
        Some(task.task_id.clone())
    );

    // 创建日志（∅ → PENDING）
    let logs = f.service.get_task_logs(&task.task_id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].log_type, LogType::StateChange);
    assert_eq!(logs[0].from_status, None);
    assert_eq!(logs[0].to_status, Some(TaskStatus::Pending));
}

#[tokio::test]
async fn test_create_task_unknown_type_rejected() {
    let f = fixture();
    let err = f
        .service
        .create_task("nope", TaskPriority::Normal, JsonMap::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_create_task_disabled_type_rejected() {
    let f = fixture();
    f.config_repo
        .create(&TaskConfigBuilder::new("echo").disabled().build())
        .await
        .unwrap();

    let err = f
        .service
        .create_task("echo", TaskPriority::Normal, JsonMap::new())
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    // 队列保持为空
    assert_eq!(f.queue_manager.pop_task().await.unwrap(), None);
}

#[tokio::test]
async fn test_cancel_pending_task_directly() {
    let f = fixture();
    f.task_repo
        .create(&TaskBuilder::new("t1").build())
        .await
        .unwrap();

    f.service.cancel_task("t1").await.unwrap();

    let cancelled = f.task_repo.get_by_id("t1").await.unwrap();
    assert_eq!(cancelled.status, TaskStatus::Cancelled);
    assert!(cancelled.completed_at.is_some());
    // 未分派的任务不需要取消标记
    assert!(!f.queue_manager.check_cancel_mark("t1").await.unwrap());
}

#[tokio::test]
async fn test_cancel_processing_task_sets_mark() {
    let f = fixture();
    f.task_repo
        .create(&TaskBuilder::new("t1").processing_since("w1", 5).build())
        .await
        .unwrap();

    f.service.cancel_task("t1").await.unwrap();

    // 处理中的任务不直接改状态，仅设置取消标记
    assert_eq!(
        f.task_repo.get_by_id("t1").await.unwrap().status,
        TaskStatus::Processing
    );
    assert!(f.queue_manager.check_cancel_mark("t1").await.unwrap());
}

#[tokio::test]
async fn test_repeated_cancel_returns_conflict() {
    let f = fixture();
    f.task_repo
        .create(&TaskBuilder::new("t1").build())
        .await
        .unwrap();

    f.service.cancel_task("t1").await.unwrap();
    let err = f.service.cancel_task("t1").await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_cancel_terminal_task_rejected() {
    let f = fixture();
    f.task_repo
        .create(&TaskBuilder::new("t1").status(TaskStatus::Success).build())
        .await
        .unwrap();

    let err = f.service.cancel_task("t1").await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_cancel_missing_task_not_found() {
    let f = fixture();
    let err = f.service.cancel_task("nope").await.unwrap_err();
    assert!(err.is_not_found());
}
