pub mod host;
pub mod notification;
pub mod rpc;
pub mod task;
pub mod task_log;

pub use host::Host;
pub use notification::NotificationRequest;
pub use rpc::{RemoteTaskRequest, RemoteTaskResponse, AGENT_RUN_PATH};
pub use task::{
    DependencyStatus, MultiMode, NotifyStatus, NotifyType, Task, TaskLevel, TaskProtocol,
    TaskStatus,
};
pub use task_log::{ExecutionOutcome, TaskLog, TaskLogStatus, TaskResult, TriggerSource};
