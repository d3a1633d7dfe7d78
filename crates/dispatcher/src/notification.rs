use uuid::Uuid;

use scheduler_core::models::{ExecutionOutcome, NotificationRequest, NotifyStatus, NotifyType, Task};

/// 通知内容中输出的最大字节数
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 4096;

/// 根据任务的通知策略决定是否发送通知
#[derive(Debug, Clone)]
pub struct NotificationDecision {
    max_output_bytes: usize,
}

impl Default for NotificationDecision {
    fn default() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl NotificationDecision {
    pub fn new(max_output_bytes: usize) -> Self {
        Self { max_output_bytes }
    }

    pub fn evaluate(
        &self,
        task: &Task,
        outcome: ExecutionOutcome,
        output: &str,
        execution_id: Uuid,
    ) -> Option<NotificationRequest> {
        let wanted = match task.notify_status {
            NotifyStatus::Never => false,
            NotifyStatus::OnFailure => !outcome.is_success(),
            NotifyStatus::OnSuccess => outcome.is_success(),
            NotifyStatus::Always => true,
        };
        if !wanted {
            return None;
        }

        if task.notify_type != NotifyType::Webhook && task.notify_receiver_ids.is_empty() {
            return None;
        }

        Some(NotificationRequest {
            execution_id,
            task_id: task.id,
            task_name: task.name.clone(),
            notify_type: task.notify_type,
            receiver_ids: task.notify_receiver_ids.clone(),
            outcome,
            output: truncate(output, self.max_output_bytes),
        })
    }
}

fn truncate(output: &str, max_bytes: usize) -> String {
    if output.len() <= max_bytes {
        return output.to_string();
    }
    let mut end = max_bytes;
    while !output.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &output[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_core::models::TaskProtocol;

    fn task(status: NotifyStatus, notify_type: NotifyType, receivers: &[&str]) -> Task {
        let mut task = Task::new("backup", TaskProtocol::Shell, "backup.sh");
        task.id = 1;
        task.notify_status = status;
        task.notify_type = notify_type;
        task.notify_receiver_ids = receivers.iter().map(|r| r.to_string()).collect();
        task
    }

    #[test]
    fn test_policy_matrix() {
        let decision = NotificationDecision::default();
        let id = Uuid::new_v4();
        let cases = [
            (NotifyStatus::Never, ExecutionOutcome::Failure, false),
            (NotifyStatus::Never, ExecutionOutcome::Success, false),
            (NotifyStatus::OnFailure, ExecutionOutcome::Failure, true),
            (NotifyStatus::OnFailure, ExecutionOutcome::Timeout, true),
            (NotifyStatus::OnFailure, ExecutionOutcome::Success, false),
            (NotifyStatus::OnSuccess, ExecutionOutcome::Success, true),
            (NotifyStatus::OnSuccess, ExecutionOutcome::Failure, false),
            (NotifyStatus::Always, ExecutionOutcome::Success, true),
            (NotifyStatus::Always, ExecutionOutcome::Failure, true),
        ];

        for (status, outcome, expected) in cases {
            let task = task(status, NotifyType::Mail, &["ops@example.com"]);
            assert_eq!(
                decision.evaluate(&task, outcome, "out", id).is_some(),
                expected,
                "{status:?} / {outcome:?}"
            );
        }
    }

    #[test]
    fn test_receivers_required_except_webhook() {
        let decision = NotificationDecision::default();
        let id = Uuid::new_v4();

        let mail = task(NotifyStatus::Always, NotifyType::Mail, &[]);
        assert!(decision
            .evaluate(&mail, ExecutionOutcome::Success, "", id)
            .is_none());

        let webhook = task(NotifyStatus::Always, NotifyType::Webhook, &[]);
        let request = decision
            .evaluate(&webhook, ExecutionOutcome::Success, "ok", id)
            .unwrap();
        assert_eq!(request.execution_id, id);
        assert_eq!(request.output, "ok");
    }

    #[test]
    fn test_output_is_truncated() {
        let decision = NotificationDecision::new(5);
        let task = task(NotifyStatus::Always, NotifyType::Slack, &["#ops"]);
        let request = decision
            .evaluate(&task, ExecutionOutcome::Failure, "错误输出内容", Uuid::new_v4())
            .unwrap();
        assert_eq!(request.output, "错...");
    }
}
