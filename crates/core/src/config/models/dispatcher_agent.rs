use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// 失败后再次尝试前的等待时间，0 表示立即重试
    pub retry_interval_ms: u64,
    /// 依赖链的最大深度
    pub max_dependency_depth: usize,
    /// 关闭时检查运行中任务数的间隔
    pub shutdown_poll_interval_seconds: u64,
    /// 关闭时等待运行中任务的最长时间，0 表示一直等待
    pub shutdown_timeout_seconds: u64,
    /// HTTP 任务未设置超时时使用的超时时间
    pub http_default_timeout_seconds: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: 0,
            max_dependency_depth: 16,
            shutdown_poll_interval_seconds: 3,
            shutdown_timeout_seconds: 0,
            http_default_timeout_seconds: 300,
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_dependency_depth == 0 {
            return Err(anyhow::anyhow!("依赖链最大深度必须大于0"));
        }

        if self.shutdown_poll_interval_seconds == 0 {
            return Err(anyhow::anyhow!("关闭检查间隔必须大于0"));
        }

        if self.http_default_timeout_seconds == 0 || self.http_default_timeout_seconds > 300 {
            return Err(anyhow::anyhow!("HTTP默认超时时间取值1-300秒"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent 模式下的监听地址
    pub bind_address: String,
    /// 调度器连接 Agent 的超时时间
    pub connect_timeout_seconds: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5921".to_string(),
            connect_timeout_seconds: 5,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_address.is_empty() {
            return Err(anyhow::anyhow!("Agent监听地址不能为空"));
        }

        if self.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(anyhow::anyhow!("Agent监听地址格式无效: {}", self.bind_address));
        }

        if self.connect_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("连接超时时间必须大于0"));
        }

        Ok(())
    }
}
