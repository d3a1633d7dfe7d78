use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use scheduler_core::config::AgentConfig;
use scheduler_core::models::AGENT_RUN_PATH;
use scheduler_core::traits::TaskExecutor;
use scheduler_infrastructure::ShellExecutor;

use crate::handlers::{health_check, run_command, AgentState};

/// 创建 Agent 路由
pub fn create_router(state: AgentState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(AGENT_RUN_PATH, post(run_command))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 远程 Agent 服务
///
/// 在目标主机上运行，接收调度器下发的命令并在本机 shell 中执行。
pub struct AgentServer {
    listener: TcpListener,
    state: AgentState,
}

impl AgentServer {
    /// 绑定配置中的监听地址，使用本机 Shell 执行器
    pub async fn bind(config: &AgentConfig) -> Result<Self> {
        Self::bind_with_executor(&config.bind_address, Arc::new(ShellExecutor::new())).await
    }

    pub async fn bind_with_executor(
        address: &str,
        executor: Arc<dyn TaskExecutor>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("绑定地址失败: {address}"))?;
        Ok(Self {
            listener,
            state: AgentState::new(executor),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("获取监听地址失败")
    }

    /// 运行直到 `shutdown` 完成，之后不再接受新请求
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let address = self.local_addr()?;
        info!("Agent服务启动在 http://{}", address);

        axum::serve(self.listener, create_router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
            .context("Agent服务运行失败")?;

        info!("Agent服务已停止");
        Ok(())
    }
}
