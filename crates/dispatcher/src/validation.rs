use scheduler_core::models::{NotifyStatus, NotifyType, Task, TaskLevel, TaskProtocol};
use scheduler_core::{SchedulerError, SchedulerResult};

use crate::cron_utils::CronScheduler;

pub const MAX_NAME_LENGTH: usize = 32;
pub const MAX_COMMAND_LENGTH: usize = 256;
pub const MAX_TIMEOUT_SECONDS: u32 = 86400;
pub const MAX_HTTP_TIMEOUT_SECONDS: u32 = 300;
pub const MAX_RETRY_TIMES: u8 = 10;

/// 保存任务前的参数校验
pub struct TaskValidator;

impl TaskValidator {
    /// 校验任务并返回规范化后的副本
    ///
    /// 子任务的 cron 表达式和子任务列表会被清空。
    pub fn validate(task: &Task) -> SchedulerResult<Task> {
        let mut task = task.clone();
        task.name = task.name.trim().to_string();
        task.command = task.command.trim().to_string();
        task.spec = task.spec.trim().to_string();

        let name_length = task.name.chars().count();
        if name_length == 0 || name_length > MAX_NAME_LENGTH {
            return Err(invalid(format!("任务名称长度必须为1-{MAX_NAME_LENGTH}个字符")));
        }

        let command_length = task.command.chars().count();
        if command_length == 0 || command_length > MAX_COMMAND_LENGTH {
            return Err(invalid(format!("命令长度必须为1-{MAX_COMMAND_LENGTH}个字符")));
        }

        if task.timeout_seconds > MAX_TIMEOUT_SECONDS {
            return Err(invalid(format!("超时时间不能超过{MAX_TIMEOUT_SECONDS}秒")));
        }

        if task.retry_times > MAX_RETRY_TIMES {
            return Err(invalid(format!("任务重试次数取值0-{MAX_RETRY_TIMES}")));
        }

        match task.protocol {
            TaskProtocol::Http => {
                if !task.command.starts_with("http://") && !task.command.starts_with("https://") {
                    return Err(invalid("请输入正确的URL地址".to_string()));
                }
                if task.timeout_seconds > MAX_HTTP_TIMEOUT_SECONDS {
                    return Err(invalid(format!(
                        "HTTP任务超时时间不能超过{MAX_HTTP_TIMEOUT_SECONDS}秒"
                    )));
                }
            }
            TaskProtocol::RemoteAgent => {
                if task.host_ids.is_empty() {
                    return Err(invalid("请选择主机名".to_string()));
                }
            }
            TaskProtocol::Shell => {}
        }

        if task.notify_status != NotifyStatus::Never
            && task.notify_type != NotifyType::Webhook
            && task.notify_receiver_ids.is_empty()
        {
            return Err(invalid("请至少选择一个通知接收者".to_string()));
        }

        match task.level {
            TaskLevel::Parent => {
                CronScheduler::validate_cron_expression(&task.spec)?;
            }
            TaskLevel::Child => {
                task.spec.clear();
                task.dependency_task_ids.clear();
            }
        }

        if task.id != 0 && task.dependency_task_ids.contains(&task.id) {
            return Err(SchedulerError::CircularDependency { task_id: task.id });
        }

        Ok(task)
    }
}

fn invalid(message: String) -> SchedulerError {
    SchedulerError::Validation(message)
}
