#![cfg(unix)]

use anyhow::Result;
use distributed_cron::app::SchedulerComponents;
use distributed_cron::shutdown::ShutdownSignal;
use scheduler_core::config::AppConfig;
use scheduler_infrastructure::SqliteRecordStore;
use scheduler_testing_utils::{RecordingNotifier, TaskBuilder, TestEnv};
use std::sync::Arc;
use std::time::{Duration, Instant};

async fn components(config: &AppConfig) -> Result<SchedulerComponents> {
    let store = Arc::new(SqliteRecordStore::in_memory().await?);
    SchedulerComponents::with_store(config, store, Arc::new(RecordingNotifier::new()))
}

async fn start_long_task(components: &SchedulerComponents, command: &str) -> Result<()> {
    let task = components
        .task_service
        .save(
            &TaskBuilder::new()
                .with_id(0)
                .with_name("long_running")
                .with_command(command)
                .build(),
        )
        .await?;
    let _handle = components.task_service.run_now(task.id).await?;

    let tracker = Arc::clone(&components.tracker);
    let started = TestEnv::wait_for(
        || {
            let tracker = Arc::clone(&tracker);
            async move { tracker.num() == 1 }
        },
        Duration::from_secs(2),
    )
    .await;
    assert!(started, "任务没有开始执行");
    Ok(())
}

#[tokio::test]
async fn test_shutdown_waits_for_running_tasks() -> Result<()> {
    let config = AppConfig::default();
    let components = components(&config).await?;
    start_long_task(&components, "sleep 1").await?;

    let started = Instant::now();
    let coordinator = components
        .shutdown_coordinator()
        .with_poll_interval(Duration::from_millis(50));
    let mut shutdown = tokio::spawn(async move { coordinator.shutdown().await });

    // 任务仍在运行时连接池不能被释放
    let registry = Arc::clone(&components.registry);
    let stopped = TestEnv::wait_for(
        || {
            let registry = Arc::clone(&registry);
            async move { registry.is_stopped() }
        },
        Duration::from_millis(500),
    )
    .await;
    assert!(stopped);
    while components.tracker.num() > 0 {
        assert!(!components.pool.is_released());
        assert!(!shutdown.is_finished());
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let drained = tokio::time::timeout(Duration::from_secs(2), &mut shutdown).await??;

    assert!(drained);
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert_eq!(components.tracker.num(), 0);
    assert!(components.registry.is_empty().await);
    assert!(components.pool.is_released());
    Ok(())
}

#[tokio::test]
async fn test_shutdown_gives_up_after_timeout() -> Result<()> {
    let mut config = AppConfig::default();
    config.dispatcher.shutdown_timeout_seconds = 1;
    let components = components(&config).await?;
    start_long_task(&components, "sleep 5").await?;

    let started = Instant::now();
    let drained = components
        .shutdown_coordinator()
        .with_poll_interval(Duration::from_millis(50))
        .shutdown()
        .await;

    assert!(!drained);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(components.pool.is_released());
    Ok(())
}

#[tokio::test]
async fn test_shutdown_signal_triggers_once() -> Result<()> {
    let signal = ShutdownSignal::new();
    let mut first = signal.subscribe();
    let mut second = signal.subscribe();
    assert!(!first.is_triggered());

    assert!(signal.trigger());
    assert!(!signal.trigger());

    tokio::time::timeout(Duration::from_secs(1), first.wait()).await?;
    tokio::time::timeout(Duration::from_secs(1), second.wait()).await?;
    assert!(signal.is_triggered());

    // 关闭后订阅立即收到信号
    let mut late = signal.subscribe();
    assert!(late.is_triggered());
    tokio::time::timeout(Duration::from_secs(1), late.wait()).await?;
    Ok(())
}

#[tokio::test]
async fn test_listener_wakes_when_signal_dropped() -> Result<()> {
    let signal = ShutdownSignal::new();
    let mut listener = signal.subscribe();
    drop(signal);

    tokio::time::timeout(Duration::from_secs(1), listener.wait()).await?;
    Ok(())
}
