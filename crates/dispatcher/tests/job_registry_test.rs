use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use scheduler_core::models::{Task, TaskStatus};
use scheduler_core::SchedulerError;
use scheduler_dispatcher::{JobRegistry, JobRunner};
use scheduler_infrastructure::MetricsCollector;
use scheduler_testing_utils::{MockTaskRepository, TaskBuilder, TestEnv};

#[derive(Default)]
struct CountingRunner {
    fired: Mutex<Vec<i64>>,
}

impl CountingRunner {
    fn fired(&self) -> Vec<i64> {
        self.fired.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobRunner for CountingRunner {
    async fn run_scheduled(&self, task: Task) {
        self.fired.lock().unwrap().push(task.id);
    }
}

fn registry_with(tasks: Vec<Task>) -> (JobRegistry, Arc<CountingRunner>) {
    let runner = Arc::new(CountingRunner::default());
    let registry = JobRegistry::new(
        runner.clone(),
        Arc::new(MockTaskRepository::with_tasks(tasks)),
        Arc::new(MetricsCollector::new()),
    );
    (registry, runner)
}

#[tokio::test]
async fn test_every_second_fires_once_in_window() {
    let (registry, runner) = registry_with(vec![]);
    let task = TaskBuilder::new().with_id(1).with_spec("@every 1s").build();

    assert!(registry.add(&task).await.unwrap());
    tokio::time::sleep(Duration::from_millis(1500)).await;
    registry.stop_all().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(runner.fired(), vec![1]);
}

#[tokio::test]
async fn test_replacing_timer_keeps_single_entry() {
    let (registry, runner) = registry_with(vec![]);
    let task = TaskBuilder::new().with_id(1).with_spec("@every 1s").build();

    registry.add(&task).await.unwrap();
    registry.add(&task).await.unwrap();
    assert_eq!(registry.len().await, 1);

    assert!(
        TestEnv::wait_for(
            || {
                let runner = Arc::clone(&runner);
                async move { !runner.fired().is_empty() }
            },
            Duration::from_secs(2),
        )
        .await
    );
    registry.stop_all().await;
    assert_eq!(runner.fired(), vec![1]);
}

#[tokio::test]
async fn test_malformed_spec_leaves_previous_timer() {
    let (registry, _runner) = registry_with(vec![]);
    let task = TaskBuilder::new().with_id(1).with_spec("0 0 1 1 *").build();
    registry.add(&task).await.unwrap();

    let registry_ref = &registry;
    assert!(
        TestEnv::wait_for(
            || async move { registry_ref.next_fire_time(1).await.is_some() },
            Duration::from_secs(1),
        )
        .await
    );
    let before = registry.next_fire_time(1).await;

    let broken = TaskBuilder::new().with_id(1).with_spec("61 * * * *").build();
    let err = registry.add(&broken).await.unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidCron { .. }));

    assert!(registry.contains(1).await);
    assert_eq!(registry.next_fire_time(1).await, before);
    assert!(before.unwrap() > Local::now());
}

#[tokio::test]
async fn test_child_task_cannot_be_registered() {
    let (registry, _runner) = registry_with(vec![]);
    let child = TaskBuilder::new().with_id(2).as_child().build();

    let err = registry.add(&child).await.unwrap_err();
    assert!(err.is_validation());
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_disabled_task_removes_timer() {
    let (registry, _runner) = registry_with(vec![]);
    let task = TaskBuilder::new().with_id(1).build();
    assert!(registry.add(&task).await.unwrap());

    let disabled = TaskBuilder::new()
        .with_id(1)
        .with_status(TaskStatus::Disabled)
        .build();
    assert!(!registry.add(&disabled).await.unwrap());
    assert!(!registry.contains(1).await);
}

#[tokio::test]
async fn test_remove_unknown_id_is_noop() {
    let (registry, _runner) = registry_with(vec![]);
    registry
        .add(&TaskBuilder::new().with_id(1).build())
        .await
        .unwrap();

    registry.remove(42).await;
    assert_eq!(registry.len().await, 1);

    registry.remove(1).await;
    registry.remove(1).await;
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_stop_all_rejects_new_timers() {
    let (registry, _runner) = registry_with(vec![]);
    registry
        .add(&TaskBuilder::new().with_id(1).build())
        .await
        .unwrap();

    registry.stop_all().await;
    assert!(registry.is_stopped());
    assert!(registry.is_empty().await);

    let added = registry
        .add(&TaskBuilder::new().with_id(2).build())
        .await
        .unwrap();
    assert!(!added);
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_initialize_registers_enabled_parents() {
    let tasks = vec![
        TaskBuilder::new().with_id(1).with_name("a").build(),
        TaskBuilder::new()
            .with_id(2)
            .with_name("b")
            .with_status(TaskStatus::Disabled)
            .build(),
        TaskBuilder::new().with_id(3).with_name("c").as_child().build(),
        TaskBuilder::new()
            .with_id(4)
            .with_name("d")
            .with_spec("not a cron")
            .build(),
        TaskBuilder::new()
            .with_id(5)
            .with_name("e")
            .with_spec("@every 9999999999999999h")
            .build(),
    ];
    let (registry, _runner) = registry_with(tasks);

    let registered = registry.initialize().await.unwrap();

    assert_eq!(registered, 1);
    assert!(registry.contains(1).await);
    assert!(!registry.contains(4).await);
    assert!(!registry.contains(5).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_add_and_stop_all_leaves_no_timer() {
    for _ in 0..20 {
        let (registry, _runner) = registry_with(vec![]);
        let registry = Arc::new(registry);

        let adders: Vec<_> = (1..=8)
            .map(|id| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    let task = TaskBuilder::new().with_id(id).build();
                    registry.add(&task).await
                })
            })
            .collect();
        let stopper = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.stop_all().await })
        };

        for adder in adders {
            adder.await.unwrap().unwrap();
        }
        stopper.await.unwrap();

        assert!(registry.is_stopped());
        assert!(registry.is_empty().await);
    }
}
