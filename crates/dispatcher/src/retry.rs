use std::time::Duration;

use tracing::warn;

use scheduler_core::models::{ExecutionOutcome, Task};
use scheduler_core::traits::{ExecutionRequest, TaskExecutor};
use scheduler_core::SchedulerError;

/// 单次尝试的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptResult {
    pub outcome: ExecutionOutcome,
    pub output: String,
}

/// 重试与超时控制
///
/// 每次尝试都有完整的超时时间，不累计。超时后执行 future 被丢弃，
/// 本地进程随之终止，远程调用随之中断。
#[derive(Debug, Clone, Default)]
pub struct RetryController {
    retry_interval: Duration,
}

impl RetryController {
    pub fn new(retry_interval: Duration) -> Self {
        Self { retry_interval }
    }

    /// 总尝试次数 = 重试次数 + 1
    pub fn max_attempts(&self, task: &Task) -> u32 {
        u32::from(task.retry_times) + 1
    }

    pub async fn run_attempt(
        &self,
        executor: &dyn TaskExecutor,
        request: &ExecutionRequest,
    ) -> AttemptResult {
        let result = if request.timeout_seconds > 0 {
            let limit = Duration::from_secs(u64::from(request.timeout_seconds));
            match tokio::time::timeout(limit, executor.execute(request)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        "任务执行超时: task_id={}, target={}, attempt={}, timeout={}s",
                        request.task_id,
                        request.target.label(),
                        request.attempt_number,
                        request.timeout_seconds
                    );
                    executor.on_timeout(request).await;
                    return AttemptResult {
                        outcome: ExecutionOutcome::Timeout,
                        output: SchedulerError::ExecutionTimeout {
                            seconds: request.timeout_seconds,
                        }
                        .to_string(),
                    };
                }
            }
        } else {
            executor.execute(request).await
        };

        match result {
            Ok(task_result) if task_result.success => AttemptResult {
                outcome: ExecutionOutcome::Success,
                output: task_result.combined_output(),
            },
            Ok(task_result) => AttemptResult {
                outcome: ExecutionOutcome::Failure,
                output: task_result.combined_output(),
            },
            // 执行器自身的超时限制先于这里的计时触发
            Err(e @ SchedulerError::ExecutionTimeout { .. }) => {
                warn!(
                    "执行器报告超时: task_id={}, target={}, attempt={}",
                    request.task_id,
                    request.target.label(),
                    request.attempt_number
                );
                AttemptResult {
                    outcome: ExecutionOutcome::Timeout,
                    output: e.to_string(),
                }
            }
            Err(e) => AttemptResult {
                outcome: ExecutionOutcome::Failure,
                output: e.to_string(),
            },
        }
    }

    pub async fn delay_before_retry(&self) {
        if !self.retry_interval.is_zero() {
            tokio::time::sleep(self.retry_interval).await;
        }
    }
}
