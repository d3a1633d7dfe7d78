//! 任务执行器接口定义
//!
//! 每种执行方式 (本地Shell、HTTP、远程Agent) 对应一个 [`TaskExecutor`] 实现，
//! 调度器按任务的 `protocol` 选择执行器，执行器只负责一次尝试，
//! 超时与重试由调度器统一控制。
//!
//! ## 使用示例
//!
//! ```rust
//! use async_trait::async_trait;
//! use scheduler_core::traits::{ExecutionRequest, TaskExecutor};
//! use scheduler_core::{models::TaskResult, SchedulerResult};
//!
//! pub struct EchoExecutor;
//!
//! #[async_trait]
//! impl TaskExecutor for EchoExecutor {
//!     async fn execute(&self, request: &ExecutionRequest) -> SchedulerResult<TaskResult> {
//!         Ok(TaskResult::success(request.command.clone()))
//!     }
//!
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::models::{Host, TaskResult};
use crate::SchedulerResult;

/// 执行目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionTarget {
    /// 调度器所在机器 (Shell 和 HTTP 任务)
    Local,
    /// 远程 Agent 主机
    Agent(Host),
}

impl ExecutionTarget {
    pub fn label(&self) -> String {
        match self {
            ExecutionTarget::Local => "localhost".to_string(),
            ExecutionTarget::Agent(host) => host.label(),
        }
    }
}

/// 单次执行请求
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub task_id: i64,
    pub task_name: String,
    pub command: String,
    /// 0 表示不限制
    pub timeout_seconds: u32,
    pub target: ExecutionTarget,
    pub attempt_number: u32,
}

/// 任务执行器
///
/// 返回 `Ok(TaskResult { success: false, .. })` 与返回 `Err` 对调度器而言等价，
/// 都会消耗一次重试机会。
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, request: &ExecutionRequest) -> SchedulerResult<TaskResult>;

    /// 单次执行超时后的回调，调用中的 future 已被丢弃
    async fn on_timeout(&self, _request: &ExecutionRequest) {}

    fn name(&self) -> &str;
}
