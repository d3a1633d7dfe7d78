use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use scheduler_agent::AgentServer;
use scheduler_core::config::{AppConfig, ObservabilityConfig};
use scheduler_core::traits::Notifier;
use scheduler_dispatcher::{ExecutorSet, JobRegistry, RunTracker, TaskDispatcher, TaskService};
use scheduler_infrastructure::{
    AgentConnectionPool, HttpExecutor, LoggingNotifier, MetricsCollector, RemoteAgentExecutor,
    ShellExecutor, SqliteRecordStore,
};
use tracing::info;

use crate::shutdown::{ShutdownCoordinator, ShutdownListener};

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 调度器：定时触发并分发任务
    Scheduler,
    /// 远程 Agent：在本机执行调度器下发的命令
    Agent,
}

impl std::str::FromStr for AppMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scheduler" => Ok(AppMode::Scheduler),
            "agent" => Ok(AppMode::Agent),
            _ => Err(anyhow::anyhow!("不支持的运行模式: {s}")),
        }
    }
}

/// 调度器模式下的全部组件
pub struct SchedulerComponents {
    pub store: Arc<SqliteRecordStore>,
    pub pool: Arc<AgentConnectionPool>,
    pub tracker: Arc<RunTracker>,
    pub dispatcher: Arc<TaskDispatcher>,
    pub registry: Arc<JobRegistry>,
    pub task_service: Arc<TaskService>,
    config: AppConfig,
}

impl SchedulerComponents {
    /// 连接配置中的数据库并组装组件
    pub async fn build(config: &AppConfig) -> Result<Self> {
        info!("连接数据库: {}", config.database.url);
        ensure_database_dir(&config.database.url).await?;

        let store = SqliteRecordStore::connect(
            &config.database.url,
            config.database.max_connections,
        )
        .await
        .context("连接数据库失败")?;

        Self::with_store(config, Arc::new(store), Arc::new(LoggingNotifier::new()))
    }

    pub fn with_store(
        config: &AppConfig,
        store: Arc<SqliteRecordStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let metrics = Arc::new(MetricsCollector::new());
        let pool = Arc::new(
            AgentConnectionPool::new(&config.agent, &config.tls)
                .context("创建Agent连接池失败")?,
        );
        let http = HttpExecutor::new(Duration::from_secs(
            config.dispatcher.http_default_timeout_seconds,
        ))
        .context("创建HTTP执行器失败")?;

        let executors = ExecutorSet {
            shell: Arc::new(ShellExecutor::new()),
            http: Arc::new(http),
            remote_agent: Arc::new(RemoteAgentExecutor::new(Arc::clone(&pool))),
        };

        let tracker = Arc::new(RunTracker::new());
        let dispatcher = Arc::new(
            TaskDispatcher::new(
                executors,
                store.clone(),
                store.clone(),
                store.clone(),
                notifier,
                Arc::clone(&tracker),
                &config.dispatcher,
            )
            .with_metrics(Arc::clone(&metrics)),
        );

        let registry = Arc::new(JobRegistry::new(
            dispatcher.clone(),
            store.clone(),
            metrics,
        ));
        let task_service = Arc::new(TaskService::new(
            store.clone(),
            Arc::clone(&registry),
            Arc::clone(&dispatcher),
        ));

        Ok(Self {
            store,
            pool,
            tracker,
            dispatcher,
            registry,
            task_service,
            config: config.clone(),
        })
    }

    pub fn shutdown_coordinator(&self) -> ShutdownCoordinator {
        ShutdownCoordinator::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.tracker),
            Arc::clone(&self.pool),
            &self.config.dispatcher,
        )
    }
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    mode: AppMode,
}

impl Application {
    pub fn new(config: AppConfig, mode: AppMode) -> Self {
        info!("初始化应用程序，模式: {:?}", mode);
        Self { config, mode }
    }

    /// 运行应用程序直到收到关闭信号
    pub async fn run(&self, shutdown: ShutdownListener) -> Result<()> {
        if self.config.observability.metrics_enabled {
            install_metrics_exporter(&self.config.observability)?;
        }

        match self.mode {
            AppMode::Scheduler => self.run_scheduler(shutdown).await,
            AppMode::Agent => self.run_agent(shutdown).await,
        }
    }

    async fn run_scheduler(&self, mut shutdown: ShutdownListener) -> Result<()> {
        info!("启动调度器");

        let components = SchedulerComponents::build(&self.config).await?;
        let registered = components
            .registry
            .initialize()
            .await
            .context("加载定时任务失败")?;
        info!("调度器已启动，定时任务数: {}", registered);

        shutdown.wait().await;
        info!("调度器收到关闭信号");

        components.shutdown_coordinator().shutdown().await;
        Ok(())
    }

    async fn run_agent(&self, mut shutdown: ShutdownListener) -> Result<()> {
        info!("启动Agent: {}", self.config.agent.bind_address);

        let server = AgentServer::bind(&self.config.agent).await?;
        server
            .serve(async move {
                shutdown.wait().await;
                info!("Agent收到关闭信号");
            })
            .await
    }
}

/// 启动 Prometheus 指标导出服务
fn install_metrics_exporter(config: &ObservabilityConfig) -> Result<()> {
    let address: SocketAddr = config
        .metrics_bind_address
        .parse()
        .with_context(|| format!("无效的指标监听地址: {}", config.metrics_bind_address))?;

    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
        .context("安装Prometheus指标导出器失败")?;

    info!("Prometheus指标导出服务启动在 http://{}/metrics", address);
    Ok(())
}

/// SQLite 不会创建数据库文件所在的目录
async fn ensure_database_dir(url: &str) -> Result<()> {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path.contains(":memory:") {
        return Ok(());
    }

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("创建数据库目录失败: {}", parent.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!("scheduler".parse::<AppMode>().unwrap(), AppMode::Scheduler);
        assert_eq!("agent".parse::<AppMode>().unwrap(), AppMode::Agent);
        assert!("worker".parse::<AppMode>().is_err());
    }

    #[tokio::test]
    async fn test_database_dir_is_created() {
        let dir = std::env::temp_dir().join(format!("cron-db-{}", std::process::id()));
        let url = format!("sqlite://{}/nested/scheduler.db", dir.display());

        ensure_database_dir(&url).await.unwrap();
        assert!(dir.join("nested").is_dir());

        ensure_database_dir("sqlite::memory:").await.unwrap();
        std::fs::remove_dir_all(dir).unwrap();
    }
}
