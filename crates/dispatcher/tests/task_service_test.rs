use std::sync::Arc;

use scheduler_core::config::DispatcherConfig;
use scheduler_core::models::{
    DependencyStatus, ExecutionOutcome, TaskProtocol, TaskStatus, TriggerSource,
};
use scheduler_core::SchedulerError;
use scheduler_dispatcher::{ExecutorSet, JobRegistry, RunTracker, TaskDispatcher, TaskService};
use scheduler_infrastructure::MetricsCollector;
use scheduler_testing_utils::{
    MockHostRepository, MockTaskExecutor, MockTaskLogRepository, MockTaskRepository,
    RecordingNotifier, TaskBuilder,
};

struct Fixture {
    tasks: MockTaskRepository,
    registry: Arc<JobRegistry>,
    service: TaskService,
}

fn fixture() -> Fixture {
    let tasks = MockTaskRepository::new();
    let executor = Arc::new(MockTaskExecutor::succeeding());
    let metrics = Arc::new(MetricsCollector::new());

    let dispatcher = Arc::new(
        TaskDispatcher::new(
            ExecutorSet {
                shell: executor.clone(),
                http: executor.clone(),
                remote_agent: executor,
            },
            Arc::new(tasks.clone()),
            Arc::new(MockHostRepository::new(tasks.clone())),
            Arc::new(MockTaskLogRepository::new()),
            Arc::new(RecordingNotifier::new()),
            Arc::new(RunTracker::new()),
            &DispatcherConfig::default(),
        )
        .with_metrics(Arc::clone(&metrics)),
    );
    let registry = Arc::new(JobRegistry::new(
        dispatcher.clone(),
        Arc::new(tasks.clone()),
        metrics,
    ));
    let service = TaskService::new(Arc::new(tasks.clone()), Arc::clone(&registry), dispatcher);

    Fixture {
        tasks,
        registry,
        service,
    }
}

#[tokio::test]
async fn test_save_new_parent_registers_timer() {
    let f = fixture();
    let task = TaskBuilder::new().with_id(0).with_name(" nightly ").build();

    let saved = f.service.save(&task).await.unwrap();

    assert_eq!(saved.id, 1);
    assert_eq!(saved.name, "nightly");
    assert_eq!(f.tasks.count(), 1);
    assert!(f.registry.contains(saved.id).await);
}

#[tokio::test]
async fn test_self_dependency_rejected_without_side_effects() {
    let f = fixture();
    let saved = f
        .service
        .save(&TaskBuilder::new().with_id(0).build())
        .await
        .unwrap();
    let before = f.tasks.get_task(saved.id).unwrap();

    let mut looped = before.clone();
    looped.dependency_task_ids = vec![saved.id];
    looped.spec = "*/5 * * * *".to_string();
    let err = f.service.save(&looped).await.unwrap_err();

    assert!(err.is_validation());
    assert!(matches!(err, SchedulerError::CircularDependency { .. }));
    assert_eq!(f.tasks.get_task(saved.id).unwrap(), before);
    assert!(f.registry.contains(saved.id).await);
    assert_eq!(f.registry.len().await, 1);
}

#[tokio::test]
async fn test_unknown_dependency_rejected() {
    let f = fixture();
    let task = TaskBuilder::new()
        .with_id(0)
        .with_dependencies(DependencyStatus::Strong, vec![99])
        .build();

    let err = f.service.save(&task).await.unwrap_err();

    assert!(err.is_validation());
    assert!(err.to_string().contains("99"));
    assert_eq!(f.tasks.count(), 0);
    assert!(f.registry.is_empty().await);
}

#[tokio::test]
async fn test_duplicate_name_rejected() {
    let f = fixture();
    f.service
        .save(&TaskBuilder::new().with_id(0).with_name("backup").build())
        .await
        .unwrap();

    let err = f
        .service
        .save(&TaskBuilder::new().with_id(0).with_name("backup").build())
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(f.tasks.count(), 1);
}

#[tokio::test]
async fn test_malformed_cron_keeps_existing_timer() {
    let f = fixture();
    let saved = f
        .service
        .save(&TaskBuilder::new().with_id(0).build())
        .await
        .unwrap();
    let before = f.tasks.get_task(saved.id).unwrap();

    let mut broken = saved.clone();
    broken.spec = "0 25 * * *".to_string();
    let err = f.service.save(&broken).await.unwrap_err();

    assert!(matches!(err, SchedulerError::InvalidCron { .. }));
    assert!(f.registry.contains(saved.id).await);
    assert_eq!(f.tasks.get_task(saved.id).unwrap().spec, before.spec);
}

#[tokio::test]
async fn test_saving_as_child_removes_timer() {
    let f = fixture();
    let saved = f
        .service
        .save(&TaskBuilder::new().with_id(0).build())
        .await
        .unwrap();
    assert!(f.registry.contains(saved.id).await);

    let child = TaskBuilder::new().with_id(saved.id).as_child().build();
    f.service.save(&child).await.unwrap();

    assert!(!f.registry.contains(saved.id).await);
    assert!(f.tasks.get_task(saved.id).unwrap().spec.is_empty());
}

#[tokio::test]
async fn test_update_missing_task_fails() {
    let f = fixture();
    let err = f
        .service
        .save(&TaskBuilder::new().with_id(7).build())
        .await
        .unwrap_err();

    assert!(matches!(err, SchedulerError::TaskNotFound { id: 7 }));
    assert!(f.registry.is_empty().await);
}

#[tokio::test]
async fn test_enable_disable_and_delete() {
    let f = fixture();
    let saved = f
        .service
        .save(&TaskBuilder::new().with_id(0).build())
        .await
        .unwrap();

    f.service.disable(saved.id).await.unwrap();
    assert!(!f.registry.contains(saved.id).await);
    assert_eq!(
        f.tasks.get_task(saved.id).unwrap().status,
        TaskStatus::Disabled
    );

    f.service.enable(saved.id).await.unwrap();
    assert!(f.registry.contains(saved.id).await);
    assert_eq!(
        f.tasks.get_task(saved.id).unwrap().status,
        TaskStatus::Enabled
    );

    f.service.delete(saved.id).await.unwrap();
    assert!(!f.registry.contains(saved.id).await);
    assert_eq!(f.tasks.count(), 0);

    assert!(matches!(
        f.service.enable(saved.id).await,
        Err(SchedulerError::TaskNotFound { .. })
    ));
}

#[tokio::test]
async fn test_run_now_dispatches_manually() {
    let f = fixture();
    let saved = f
        .service
        .save(
            &TaskBuilder::new()
                .with_id(0)
                .with_protocol(TaskProtocol::Shell)
                .with_status(TaskStatus::Disabled)
                .build(),
        )
        .await
        .unwrap();
    assert!(!f.registry.contains(saved.id).await);

    let report = f.service.run_now(saved.id).await.unwrap().await.unwrap();

    let root = report.root().unwrap();
    assert_eq!(root.trigger, TriggerSource::Manual);
    assert_eq!(root.outcome, ExecutionOutcome::Success);

    assert!(matches!(
        f.service.run_now(404).await,
        Err(SchedulerError::TaskNotFound { id: 404 })
    ));
}
