//! 数据仓储层接口定义
//!
//! 调度核心把持久化层视为一个查询/追加服务，只依赖以下接口：
//! - `TaskRepository` - 任务定义的读取和维护
//! - `HostRepository` - 远程 Agent 主机查询
//! - `TaskLogRepository` - 执行日志的追加与结束
//!
//! 所有接口都是异步的，并要求 `Send + Sync`，
//! 以便在多个并发执行之间共享同一个实例。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use scheduler_core::traits::TaskRepository;
//!
//! async fn load(repo: &dyn TaskRepository) -> SchedulerResult<()> {
//!     let tasks = repo.get_enabled_parent_tasks().await?;
//!     println!("需要调度的主任务数量: {}", tasks.len());
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Host, Task, TaskLog, TaskLogStatus, TaskStatus};
use crate::SchedulerResult;

/// 任务仓储接口
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// 获取所有已启用的主任务，进程启动时用于重建定时器
    async fn get_enabled_parent_tasks(&self) -> SchedulerResult<Vec<Task>>;

    async fn get_by_id(&self, id: i64) -> SchedulerResult<Option<Task>>;

    /// 创建任务，返回带有数据库ID的任务
    async fn create(&self, task: &Task) -> SchedulerResult<Task>;

    async fn update(&self, task: &Task) -> SchedulerResult<()>;

    async fn delete(&self, id: i64) -> SchedulerResult<()>;

    async fn update_status(&self, id: i64, status: TaskStatus) -> SchedulerResult<()>;

    /// 检查任务名称是否已被其他任务使用
    async fn name_exists(&self, name: &str, exclude_id: i64) -> SchedulerResult<bool>;
}

/// 主机仓储接口
#[async_trait]
pub trait HostRepository: Send + Sync {
    async fn get_by_id(&self, id: i64) -> SchedulerResult<Option<Host>>;

    /// 获取任务关联的全部主机
    async fn get_hosts_for_task(&self, task_id: i64) -> SchedulerResult<Vec<Host>>;

    async fn create(&self, host: &Host) -> SchedulerResult<Host>;
}

/// 执行日志仓储接口
#[async_trait]
pub trait TaskLogRepository: Send + Sync {
    /// 写入一条运行中的日志，返回日志ID
    async fn create(&self, log: &TaskLog) -> SchedulerResult<i64>;

    /// 结束日志
    async fn finish(
        &self,
        id: i64,
        status: TaskLogStatus,
        output: &str,
        finished_at: DateTime<Utc>,
    ) -> SchedulerResult<()>;

    /// 按尝试顺序返回任务的执行日志
    async fn list_by_task(&self, task_id: i64) -> SchedulerResult<Vec<TaskLog>>;
}
