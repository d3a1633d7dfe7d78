//! 调度器与远程 Agent 之间的请求/响应协议

use serde::{Deserialize, Serialize};

/// Agent 执行命令的HTTP路径
pub const AGENT_RUN_PATH: &str = "/api/v1/run";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteTaskRequest {
    pub command: String,
    /// 0 表示不限制
    pub timeout_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RemoteTaskResponse {
    pub output: String,
    /// 为空表示执行成功
    pub error: String,
}

impl RemoteTaskResponse {
    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }
}
