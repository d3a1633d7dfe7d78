use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::SchedulerError;

/// 任务定义
///
/// 系统中可调度执行的任务单元。主任务拥有自己的 cron 表达式，
/// 子任务只会在主任务执行结束后被依赖关系触发。
///
/// # 字段说明
///
/// - `level`: 任务级别，主任务或子任务
/// - `dependency_status`: 依赖关系，强依赖时主任务成功才触发子任务
/// - `dependency_task_ids`: 子任务 ID 列表，按顺序保存
/// - `spec`: cron 表达式，仅主任务有效
/// - `protocol`: 执行方式，本地 Shell、HTTP 或远程 Agent
/// - `timeout_seconds`: 单次执行超时时间，0 表示不限制
/// - `multi`: 多主机时串行还是并行执行
/// - `retry_times`: 失败后的额外重试次数 (0-10)
/// - `host_ids`: 远程 Agent 主机 ID 列表
///
/// # 使用示例
///
/// ```rust
/// use scheduler_core::models::{Task, TaskProtocol};
///
/// let mut task = Task::new("数据备份", TaskProtocol::Shell, "backup.sh");
/// task.spec = "0 2 * * *".to_string(); // 每天凌晨2点
/// task.retry_times = 3;
/// assert!(task.is_parent());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: i64,
    pub name: String,
    pub level: TaskLevel,
    pub dependency_status: DependencyStatus,
    pub dependency_task_ids: Vec<i64>,
    pub spec: String,
    pub protocol: TaskProtocol,
    pub command: String,
    pub timeout_seconds: u32,
    pub multi: MultiMode,
    pub retry_times: u8,
    pub host_ids: Vec<i64>,
    pub status: TaskStatus,
    pub notify_status: NotifyStatus,
    pub notify_type: NotifyType,
    pub notify_receiver_ids: Vec<String>,
    pub tag: String,
    pub remark: String,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// 创建新任务
    pub fn new(name: &str, protocol: TaskProtocol, command: &str) -> Self {
        Self {
            id: 0, // 将由数据库生成
            name: name.to_string(),
            level: TaskLevel::Parent,
            dependency_status: DependencyStatus::Strong,
            dependency_task_ids: Vec::new(),
            spec: String::new(),
            protocol,
            command: command.to_string(),
            timeout_seconds: 0,
            multi: MultiMode::Parallel,
            retry_times: 0,
            host_ids: Vec::new(),
            status: TaskStatus::Enabled,
            notify_status: NotifyStatus::Never,
            notify_type: NotifyType::Mail,
            notify_receiver_ids: Vec::new(),
            tag: String::new(),
            remark: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_parent(&self) -> bool {
        self.level == TaskLevel::Parent
    }

    pub fn is_enabled(&self) -> bool {
        self.status == TaskStatus::Enabled
    }

    /// 检查任务是否有子任务
    pub fn has_dependencies(&self) -> bool {
        !self.dependency_task_ids.is_empty()
    }

    /// 是否应当由定时器调度
    pub fn is_schedulable(&self) -> bool {
        self.is_parent() && self.is_enabled()
    }
}

/// 任务级别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskLevel {
    #[serde(rename = "PARENT")]
    Parent,
    #[serde(rename = "CHILD")]
    Child,
}

/// 依赖关系
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DependencyStatus {
    /// 强依赖: 主任务执行成功才会运行子任务
    #[serde(rename = "STRONG")]
    Strong,
    /// 弱依赖: 无论主任务执行是否成功都会运行子任务
    #[serde(rename = "WEAK")]
    Weak,
}

/// 执行方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskProtocol {
    #[serde(rename = "HTTP")]
    Http,
    #[serde(rename = "REMOTE_AGENT")]
    RemoteAgent,
    #[serde(rename = "SHELL")]
    Shell,
}

/// 多主机执行模式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MultiMode {
    #[serde(rename = "SERIAL")]
    Serial,
    #[serde(rename = "PARALLEL")]
    Parallel,
}

/// 任务状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    #[serde(rename = "DISABLED")]
    Disabled,
    #[serde(rename = "ENABLED")]
    Enabled,
    /// 最近一次已知处于运行中
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

/// 通知策略
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NotifyStatus {
    #[serde(rename = "NEVER")]
    Never,
    #[serde(rename = "ON_FAILURE")]
    OnFailure,
    #[serde(rename = "ON_SUCCESS")]
    OnSuccess,
    #[serde(rename = "ALWAYS")]
    Always,
}

/// 通知渠道
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NotifyType {
    #[serde(rename = "MAIL")]
    Mail,
    #[serde(rename = "SLACK")]
    Slack,
    #[serde(rename = "WEBHOOK")]
    Webhook,
}

fn invalid_value(kind: &str, value: i64) -> SchedulerError {
    SchedulerError::Serialization(format!("无效的{kind}取值: {value}"))
}

impl TaskLevel {
    pub fn as_i64(self) -> i64 {
        match self {
            TaskLevel::Parent => 1,
            TaskLevel::Child => 2,
        }
    }
}

impl TryFrom<i64> for TaskLevel {
    type Error = SchedulerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(TaskLevel::Parent),
            2 => Ok(TaskLevel::Child),
            v => Err(invalid_value("任务级别", v)),
        }
    }
}

impl DependencyStatus {
    pub fn as_i64(self) -> i64 {
        match self {
            DependencyStatus::Strong => 1,
            DependencyStatus::Weak => 2,
        }
    }
}

impl TryFrom<i64> for DependencyStatus {
    type Error = SchedulerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(DependencyStatus::Strong),
            2 => Ok(DependencyStatus::Weak),
            v => Err(invalid_value("依赖关系", v)),
        }
    }
}

impl TaskProtocol {
    pub fn as_i64(self) -> i64 {
        match self {
            TaskProtocol::Http => 1,
            TaskProtocol::RemoteAgent => 2,
            TaskProtocol::Shell => 3,
        }
    }
}

impl TryFrom<i64> for TaskProtocol {
    type Error = SchedulerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(TaskProtocol::Http),
            2 => Ok(TaskProtocol::RemoteAgent),
            3 => Ok(TaskProtocol::Shell),
            v => Err(invalid_value("执行方式", v)),
        }
    }
}

impl MultiMode {
    pub fn as_i64(self) -> i64 {
        match self {
            MultiMode::Serial => 0,
            MultiMode::Parallel => 1,
        }
    }
}

impl TryFrom<i64> for MultiMode {
    type Error = SchedulerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MultiMode::Serial),
            1 => Ok(MultiMode::Parallel),
            v => Err(invalid_value("多主机执行模式", v)),
        }
    }
}

impl TaskStatus {
    pub fn as_i64(self) -> i64 {
        match self {
            TaskStatus::Disabled => 0,
            TaskStatus::Enabled => 1,
            TaskStatus::Running => 2,
            TaskStatus::Cancelled => 3,
        }
    }
}

impl TryFrom<i64> for TaskStatus {
    type Error = SchedulerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TaskStatus::Disabled),
            1 => Ok(TaskStatus::Enabled),
            2 => Ok(TaskStatus::Running),
            3 => Ok(TaskStatus::Cancelled),
            v => Err(invalid_value("任务状态", v)),
        }
    }
}

impl NotifyStatus {
    pub fn as_i64(self) -> i64 {
        match self {
            NotifyStatus::Never => 0,
            NotifyStatus::OnFailure => 1,
            NotifyStatus::OnSuccess => 2,
            NotifyStatus::Always => 3,
        }
    }
}

impl TryFrom<i64> for NotifyStatus {
    type Error = SchedulerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(NotifyStatus::Never),
            1 => Ok(NotifyStatus::OnFailure),
            2 => Ok(NotifyStatus::OnSuccess),
            3 => Ok(NotifyStatus::Always),
            v => Err(invalid_value("通知策略", v)),
        }
    }
}

impl NotifyType {
    pub fn as_i64(self) -> i64 {
        match self {
            NotifyType::Mail => 0,
            NotifyType::Slack => 1,
            NotifyType::Webhook => 2,
        }
    }
}

impl TryFrom<i64> for NotifyType {
    type Error = SchedulerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(NotifyType::Mail),
            1 => Ok(NotifyType::Slack),
            2 => Ok(NotifyType::Webhook),
            v => Err(invalid_value("通知渠道", v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_defaults() {
        let task = Task::new("backup", TaskProtocol::Shell, "echo ok");
        assert_eq!(task.id, 0);
        assert!(task.is_parent());
        assert!(task.is_enabled());
        assert!(task.is_schedulable());
        assert!(!task.has_dependencies());
        assert_eq!(task.retry_times, 0);
    }

    #[test]
    fn test_child_task_is_not_schedulable() {
        let mut task = Task::new("child", TaskProtocol::Shell, "echo ok");
        task.level = TaskLevel::Child;
        assert!(!task.is_schedulable());

        let mut disabled = Task::new("disabled", TaskProtocol::Shell, "echo ok");
        disabled.status = TaskStatus::Disabled;
        assert!(!disabled.is_schedulable());
    }

    #[test]
    fn test_integer_representation() {
        for protocol in [TaskProtocol::Http, TaskProtocol::RemoteAgent, TaskProtocol::Shell] {
            assert_eq!(TaskProtocol::try_from(protocol.as_i64()).unwrap(), protocol);
        }
        for status in [
            NotifyStatus::Never,
            NotifyStatus::OnFailure,
            NotifyStatus::OnSuccess,
            NotifyStatus::Always,
        ] {
            assert_eq!(NotifyStatus::try_from(status.as_i64()).unwrap(), status);
        }
        assert!(TaskLevel::try_from(7).is_err());
        assert!(TaskStatus::try_from(-1).is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&TaskProtocol::RemoteAgent).unwrap();
        assert_eq!(json, "\"REMOTE_AGENT\"");
        let status: TaskStatus = serde_json::from_str("\"ENABLED\"").unwrap();
        assert_eq!(status, TaskStatus::Enabled);
    }
}
