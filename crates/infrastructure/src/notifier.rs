use async_trait::async_trait;
use scheduler_core::models::NotificationRequest;
use scheduler_core::traits::Notifier;
use scheduler_core::SchedulerResult;
use tracing::info;

/// 只记录日志的通知实现
///
/// 调度器只负责决定是否通知以及通知内容，投递由外部服务完成。
/// 未接入外部服务时使用该实现。
#[derive(Debug, Default, Clone)]
pub struct LoggingNotifier;

impl LoggingNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, request: &NotificationRequest) -> SchedulerResult<()> {
        info!(
            execution_id = %request.execution_id,
            task_id = request.task_id,
            notify_type = ?request.notify_type,
            receivers = ?request.receiver_ids,
            outcome = ?request.outcome,
            "发送任务通知: {}",
            request.task_name
        );
        Ok(())
    }
}
