use std::sync::Arc;
use std::time::Duration;

use scheduler_core::config::DispatcherConfig;
use scheduler_dispatcher::{JobRegistry, RunTracker};
use scheduler_infrastructure::AgentConnectionPool;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// 进程级关闭信号
///
/// 基于 `watch` 通道，只记录"是否已关闭"这一个状态。触发之后才订阅的一方
/// 也能立即观察到关闭，不需要额外补发。
#[derive(Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// 触发关闭，只有第一次调用返回 `true`
    pub fn trigger(&self) -> bool {
        let first = self.tx.send_if_modified(|stopped| !std::mem::replace(stopped, true));
        if first {
            info!("触发系统关闭，订阅者: {}", self.tx.receiver_count());
        } else {
            debug!("系统关闭已经触发过");
        }
        first
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// 关闭信号的接收端
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// 等待关闭信号，发送端全部释放时同样视为关闭
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

/// 调度器关闭流程
///
/// 1. 停止所有定时器，不再产生新的执行
/// 2. 每隔一段时间检查正在执行的任务数，直到为 0 或超时
/// 3. 关闭 Agent 连接池
pub struct ShutdownCoordinator {
    registry: Arc<JobRegistry>,
    tracker: Arc<RunTracker>,
    pool: Arc<AgentConnectionPool>,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl ShutdownCoordinator {
    pub fn new(
        registry: Arc<JobRegistry>,
        tracker: Arc<RunTracker>,
        pool: Arc<AgentConnectionPool>,
        config: &DispatcherConfig,
    ) -> Self {
        Self {
            registry,
            tracker,
            pool,
            poll_interval: Duration::from_secs(config.shutdown_poll_interval_seconds.max(1)),
            timeout: (config.shutdown_timeout_seconds > 0)
                .then(|| Duration::from_secs(config.shutdown_timeout_seconds)),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// 执行关闭流程，返回所有任务是否在关闭前执行完毕
    pub async fn shutdown(&self) -> bool {
        info!("开始关闭调度器");
        self.registry.stop_all().await;

        let wait = self.tracker.wait_idle(self.poll_interval);
        let drained = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(()) => true,
                Err(_) => {
                    warn!(
                        "等待任务结束超时({}秒)，仍有 {} 个任务在运行",
                        limit.as_secs(),
                        self.tracker.num()
                    );
                    false
                }
            },
            None => {
                wait.await;
                true
            }
        };

        self.pool.release_all().await;
        info!("调度器已关闭");
        drained
    }
}
