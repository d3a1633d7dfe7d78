//! Test data builders for creating test entities
//!
//! Builders start from sensible defaults so a test only spells out
//! the fields it cares about.

use chrono::Utc;
use scheduler_core::models::{
    DependencyStatus, Host, MultiMode, NotifyStatus, NotifyType, Task, TaskLevel, TaskProtocol,
    TaskStatus,
};

/// Builder for creating test Task entities
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new() -> Self {
        Self {
            task: Task {
                id: 1,
                name: "test_task".to_string(),
                level: TaskLevel::Parent,
                dependency_status: DependencyStatus::Strong,
                dependency_task_ids: vec![],
                spec: "0 0 * * *".to_string(),
                protocol: TaskProtocol::Shell,
                command: "echo ok".to_string(),
                timeout_seconds: 0,
                multi: MultiMode::Parallel,
                retry_times: 0,
                host_ids: vec![],
                status: TaskStatus::Enabled,
                notify_status: NotifyStatus::Never,
                notify_type: NotifyType::Mail,
                notify_receiver_ids: vec![],
                tag: String::new(),
                remark: String::new(),
                created_at: Utc::now(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.task.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.task.name = name.to_string();
        self
    }

    pub fn with_protocol(mut self, protocol: TaskProtocol) -> Self {
        self.task.protocol = protocol;
        self
    }

    pub fn with_command(mut self, command: &str) -> Self {
        self.task.command = command.to_string();
        self
    }

    pub fn with_spec(mut self, spec: &str) -> Self {
        self.task.spec = spec.to_string();
        self
    }

    /// 子任务，没有 cron 表达式
    pub fn as_child(mut self) -> Self {
        self.task.level = TaskLevel::Child;
        self.task.spec = String::new();
        self
    }

    pub fn with_dependencies(mut self, status: DependencyStatus, task_ids: Vec<i64>) -> Self {
        self.task.dependency_status = status;
        self.task.dependency_task_ids = task_ids;
        self
    }

    pub fn with_timeout(mut self, timeout_seconds: u32) -> Self {
        self.task.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_retry_times(mut self, retry_times: u8) -> Self {
        self.task.retry_times = retry_times;
        self
    }

    pub fn with_multi(mut self, multi: MultiMode) -> Self {
        self.task.multi = multi;
        self
    }

    pub fn with_hosts(mut self, host_ids: Vec<i64>) -> Self {
        self.task.host_ids = host_ids;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        self
    }

    pub fn with_notify(
        mut self,
        status: NotifyStatus,
        notify_type: NotifyType,
        receivers: &[&str],
    ) -> Self {
        self.task.notify_status = status;
        self.task.notify_type = notify_type;
        self.task.notify_receiver_ids = receivers.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test Host entities
pub struct HostBuilder {
    host: Host,
}

impl HostBuilder {
    pub fn new() -> Self {
        Self {
            host: Host {
                id: 1,
                name: "127.0.0.1".to_string(),
                port: 5921,
                alias: String::new(),
                remark: String::new(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.host.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.host.name = name.to_string();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.host.port = port;
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.host.alias = alias.to_string();
        self
    }

    pub fn build(self) -> Host {
        self.host
    }
}

impl Default for HostBuilder {
    fn default() -> Self {
        Self::new()
    }
}
