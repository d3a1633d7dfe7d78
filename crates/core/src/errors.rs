use thiserror::Error;

/// 调度器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("任务未找到: {id}")]
    TaskNotFound { id: i64 },

    #[error("主机未找到: {id}")]
    HostNotFound { id: i64 },

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("不允许设置当前任务为子任务: 任务ID {task_id}")]
    CircularDependency { task_id: i64 },

    #[error("任务执行超时: {seconds}秒")]
    ExecutionTimeout { seconds: u32 },

    #[error("传输错误: {0}")]
    Transport(String),

    #[error("任务执行错误: {0}")]
    TaskExecution(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl SchedulerError {
    /// 是否为保存任务前的校验类错误
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SchedulerError::Validation(_)
                | SchedulerError::InvalidCron { .. }
                | SchedulerError::CircularDependency { .. }
        )
    }

    /// 是否为单次执行内的可重试错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SchedulerError::Transport(_)
                | SchedulerError::ExecutionTimeout { .. }
                | SchedulerError::TaskExecution(_)
        )
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(e: serde_json::Error) -> Self {
        SchedulerError::Serialization(e.to_string())
    }
}

/// 统一的Result类型
pub type Result<T> = std::result::Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(SchedulerError::Validation("x".into()).is_validation());
        assert!(SchedulerError::CircularDependency { task_id: 1 }.is_validation());
        assert!(SchedulerError::InvalidCron {
            expr: "* * *".into(),
            message: "bad".into()
        }
        .is_validation());
        assert!(!SchedulerError::Transport("refused".into()).is_validation());

        assert!(SchedulerError::Transport("refused".into()).is_retryable());
        assert!(SchedulerError::ExecutionTimeout { seconds: 3 }.is_retryable());
        assert!(!SchedulerError::Configuration("ca".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = SchedulerError::TaskNotFound { id: 42 };
        assert_eq!(err.to_string(), "任务未找到: 42");
    }
}
