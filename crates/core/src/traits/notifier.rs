use async_trait::async_trait;

use crate::models::NotificationRequest;
use crate::SchedulerResult;

/// 通知投递接口，由外部服务实现 (邮件、Slack、Webhook)
///
/// 投递失败只记录日志，不影响任务执行。
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, request: &NotificationRequest) -> SchedulerResult<()>;
}
