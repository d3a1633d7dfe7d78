//! 分布式定时任务调度的核心类型
//!
//! 包含任务、主机和执行日志模型，调度器各组件之间共享的接口，
//! 以及统一的错误类型和配置模型。

pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use errors::*;

pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;
