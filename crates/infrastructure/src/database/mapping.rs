//! SQLite 行与领域模型之间的转换

use scheduler_core::models::{
    DependencyStatus, Host, MultiMode, NotifyStatus, NotifyType, Task, TaskLevel, TaskLog,
    TaskLogStatus, TaskProtocol, TaskStatus, TriggerSource,
};
use scheduler_core::{SchedulerError, SchedulerResult};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

pub struct MappingHelpers;

impl MappingHelpers {
    pub fn to_json<T: serde::Serialize>(value: &T) -> SchedulerResult<String> {
        Ok(serde_json::to_string(value)?)
    }

    /// 解析 JSON 数组字段，空值视为空列表
    pub fn parse_json_list<T: serde::de::DeserializeOwned>(
        row: &SqliteRow,
        field_name: &str,
    ) -> SchedulerResult<Vec<T>> {
        match row.try_get::<Option<String>, _>(field_name)? {
            Some(json_str) if !json_str.is_empty() => serde_json::from_str(&json_str).map_err(|e| {
                SchedulerError::Serialization(format!("解析字段 {field_name} 失败: {e}"))
            }),
            _ => Ok(Vec::new()),
        }
    }

    fn narrow<T: TryFrom<i64>>(row: &SqliteRow, field_name: &str) -> SchedulerResult<T> {
        let value: i64 = row.try_get(field_name)?;
        T::try_from(value).map_err(|_| {
            SchedulerError::Serialization(format!("字段 {field_name} 超出范围: {value}"))
        })
    }

    /// `host_ids` 存放在 task_hosts 表中，由调用方补充
    pub fn row_to_task(row: &SqliteRow) -> SchedulerResult<Task> {
        Ok(Task {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            level: TaskLevel::try_from(row.try_get::<i64, _>("level")?)?,
            dependency_status: DependencyStatus::try_from(
                row.try_get::<i64, _>("dependency_status")?,
            )?,
            dependency_task_ids: Self::parse_json_list(row, "dependency_task_ids")?,
            spec: row.try_get("spec")?,
            protocol: TaskProtocol::try_from(row.try_get::<i64, _>("protocol")?)?,
            command: row.try_get("command")?,
            timeout_seconds: Self::narrow(row, "timeout_seconds")?,
            multi: MultiMode::try_from(row.try_get::<i64, _>("multi")?)?,
            retry_times: Self::narrow(row, "retry_times")?,
            host_ids: Vec::new(),
            status: TaskStatus::try_from(row.try_get::<i64, _>("status")?)?,
            notify_status: NotifyStatus::try_from(row.try_get::<i64, _>("notify_status")?)?,
            notify_type: NotifyType::try_from(row.try_get::<i64, _>("notify_type")?)?,
            notify_receiver_ids: Self::parse_json_list(row, "notify_receiver_ids")?,
            tag: row.try_get("tag")?,
            remark: row.try_get("remark")?,
            created_at: row.try_get("created_at")?,
        })
    }

    pub fn row_to_host(row: &SqliteRow) -> SchedulerResult<Host> {
        Ok(Host {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            port: Self::narrow(row, "port")?,
            alias: row.try_get("alias")?,
            remark: row.try_get("remark")?,
        })
    }

    pub fn row_to_task_log(row: &SqliteRow) -> SchedulerResult<TaskLog> {
        let execution_id: String = row.try_get("execution_id")?;
        let trigger: String = row.try_get("trigger_source")?;
        let status: String = row.try_get("status")?;

        Ok(TaskLog {
            id: row.try_get("id")?,
            execution_id: Uuid::parse_str(&execution_id)
                .map_err(|e| SchedulerError::Serialization(format!("解析执行ID失败: {e}")))?,
            task_id: row.try_get("task_id")?,
            task_name: row.try_get("task_name")?,
            trigger: serde_json::from_str::<TriggerSource>(&trigger)?,
            host: row.try_get("host")?,
            attempt_number: Self::narrow(row, "attempt_number")?,
            status: status.parse::<TaskLogStatus>()?,
            output: row.try_get("output")?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
        })
    }
}
