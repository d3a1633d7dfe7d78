use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::SchedulerError;

/// 单次尝试或整个任务执行的结果
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ExecutionOutcome {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILURE")]
    Failure,
    #[serde(rename = "TIMEOUT")]
    Timeout,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl ExecutionOutcome {
    pub fn is_success(self) -> bool {
        self == ExecutionOutcome::Success
    }
}

/// 执行日志状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskLogStatus {
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "FINISHED")]
    Finished(ExecutionOutcome),
}

impl TaskLogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskLogStatus::Running => "RUNNING",
            TaskLogStatus::Finished(ExecutionOutcome::Success) => "SUCCESS",
            TaskLogStatus::Finished(ExecutionOutcome::Failure) => "FAILURE",
            TaskLogStatus::Finished(ExecutionOutcome::Timeout) => "TIMEOUT",
            TaskLogStatus::Finished(ExecutionOutcome::Cancelled) => "CANCELLED",
        }
    }

    pub fn outcome(&self) -> Option<ExecutionOutcome> {
        match self {
            TaskLogStatus::Running => None,
            TaskLogStatus::Finished(outcome) => Some(*outcome),
        }
    }
}

impl std::str::FromStr for TaskLogStatus {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING" => Ok(TaskLogStatus::Running),
            "SUCCESS" => Ok(TaskLogStatus::Finished(ExecutionOutcome::Success)),
            "FAILURE" => Ok(TaskLogStatus::Finished(ExecutionOutcome::Failure)),
            "TIMEOUT" => Ok(TaskLogStatus::Finished(ExecutionOutcome::Timeout)),
            "CANCELLED" => Ok(TaskLogStatus::Finished(ExecutionOutcome::Cancelled)),
            _ => Err(SchedulerError::Serialization(format!(
                "Invalid task log status: {s}"
            ))),
        }
    }
}

/// 触发来源
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TriggerSource {
    /// 定时器触发
    Scheduled,
    /// 手动运行
    Manual,
    /// 由主任务执行结束后触发
    Dependency { parent_id: i64 },
}

impl TriggerSource {
    /// 写入日志的触发说明
    pub fn describe(&self) -> String {
        match self {
            TriggerSource::Scheduled => "定时调度".to_string(),
            TriggerSource::Manual => "手动运行".to_string(),
            TriggerSource::Dependency { parent_id } => format!("依赖任务(主任务ID-{parent_id})"),
        }
    }
}

/// 任务执行日志，每次尝试对应一条
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLog {
    pub id: i64,
    /// 同一次任务执行的所有尝试共享该ID
    pub execution_id: Uuid,
    pub task_id: i64,
    pub task_name: String,
    pub trigger: TriggerSource,
    /// 目标主机标识，本地执行时为 "localhost"
    pub host: String,
    pub attempt_number: u32,
    pub status: TaskLogStatus,
    pub output: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskLog {
    pub fn start(
        execution_id: Uuid,
        task_id: i64,
        task_name: &str,
        trigger: TriggerSource,
        host: &str,
        attempt_number: u32,
    ) -> Self {
        Self {
            id: 0, // 将由数据库生成
            execution_id,
            task_id,
            task_name: task_name.to_string(),
            trigger,
            host: host.to_string(),
            attempt_number,
            status: TaskLogStatus::Running,
            output: String::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// 结束日志，已结束的日志不会被再次修改
    pub fn finish(&mut self, outcome: ExecutionOutcome, output: String) -> bool {
        if self.is_finished() {
            return false;
        }
        self.status = TaskLogStatus::Finished(outcome);
        self.output = output;
        self.finished_at = Some(Utc::now());
        true
    }

    pub fn execution_duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_milliseconds())
    }
}

/// 执行器返回的单次执行结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    pub output: Option<String>,
    pub error_message: Option<String>,
    pub exit_code: Option<i32>,
    pub execution_time_ms: u64,
}

impl TaskResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error_message: None,
            exit_code: Some(0),
            execution_time_ms: 0,
        }
    }

    pub fn failure(error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error_message: Some(error_message.into()),
            exit_code: None,
            execution_time_ms: 0,
        }
    }

    /// 合并输出和错误信息，写入执行日志
    pub fn combined_output(&self) -> String {
        match (&self.output, &self.error_message) {
            (Some(output), Some(error)) if !output.is_empty() => format!("{output}\n{error}"),
            (_, Some(error)) => error.clone(),
            (Some(output), None) => output.clone(),
            (None, None) => String::new(),
        }
    }
}
