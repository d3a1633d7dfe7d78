use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ExecutionOutcome, NotifyType};

/// 通知请求，仅包含消息内容，由外部通知服务负责投递
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationRequest {
    pub execution_id: Uuid,
    pub task_id: i64,
    pub task_name: String,
    pub notify_type: NotifyType,
    pub receiver_ids: Vec<String>,
    pub outcome: ExecutionOutcome,
    pub output: String,
}
