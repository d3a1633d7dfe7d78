//! 调度器
//!
//! 定时器注册表按 cron 表达式触发任务，调度器负责在各个目标上执行、
//! 重试、记录日志、发送通知，以及按依赖关系执行子任务。

pub mod cron_utils;
pub mod dependency_resolver;
pub mod dispatcher;
pub mod job_registry;
pub mod notification;
pub mod retry;
pub mod run_tracker;
pub mod task_service;
pub mod validation;

pub use cron_utils::CronScheduler;
pub use dependency_resolver::DependencyResolver;
pub use dispatcher::{DispatchReport, ExecutionReport, ExecutorSet, TargetReport, TaskDispatcher};
pub use job_registry::{JobRegistry, JobRunner};
pub use notification::NotificationDecision;
pub use retry::{AttemptResult, RetryController};
pub use run_tracker::{RunGuard, RunTracker};
pub use task_service::TaskService;
pub use validation::TaskValidator;
